//! Thread-safe facade over a single index engine.
//!
//! The engine tolerates exactly one operation at a time, so every call that
//! touches it (adds, removes, state queries, flushes, close and cursor
//! advances from search sessions) runs inside the same mutex. Guards are
//! released with [`MutexGuard::unlock_fair`] so waiting callers are served in
//! arrival order rather than letting one thread re-acquire the lock in a loop.
//!
//! Every public operation is total: failures are logged and reported as
//! `false`, an empty list or [`DocumentState::NotIndexed`].

use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::file_discovery::{list_all_files, FileDiscoveryConfig};
use super::progressive::{ProgressiveSearch, SearchResult};
use crate::config::{Config, IndexConfig, StopWordSet};
use crate::error::{EngineError, Result};
use crate::extract;
use crate::index::{
    AddOutcome, CancelToken, DocumentState, IndexEngine, LocalEngine, SearchOptions,
};

/// Time budget per batch for [`SearchIndexer::search`]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// The engine slot shared between an indexer and its search sessions.
/// `None` once the index has been closed.
pub(crate) struct Shared<E> {
    engine: Mutex<Option<E>>,
}

impl<E: IndexEngine> Shared<E> {
    /// Run `op` with exclusive access to the engine slot
    pub(crate) fn serialized<R>(&self, op: impl FnOnce(&mut Option<E>) -> R) -> R {
        let mut guard = self.engine.lock();
        let result = op(&mut guard);
        MutexGuard::unlock_fair(guard);
        result
    }

    fn with_open<R>(&self, op: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        self.serialized(|slot| match slot.as_mut() {
            Some(engine) => op(engine),
            None => Err(EngineError::Closed),
        })
    }
}

fn log_failure(op: &str, url: &str, err: &EngineError) {
    if err.is_precondition() {
        debug!(op, url, error = %err, "Index operation rejected");
    } else {
        warn!(op, url, error = %err, "Index operation failed");
    }
}

fn add_outcome(op: &str, url: &str, result: Result<AddOutcome>) -> AddOutcome {
    match result {
        Ok(outcome) => {
            debug!(op, url, ?outcome, "Document staged");
            outcome
        }
        Err(e) => {
            log_failure(op, url, &e);
            AddOutcome::Failed
        }
    }
}

fn file_path(url: &Url) -> Result<PathBuf> {
    url.to_file_path()
        .map_err(|_| EngineError::InvalidUrl(url.to_string()))
}

/// Extract a file's text. Runs outside the engine lock.
fn extract_text(path: &Path, mime_hint: Option<&str>) -> Result<String> {
    let detected;
    let mime = match mime_hint {
        Some(hint) => Some(hint),
        None => {
            detected = extract::mime::detect(path);
            detected.as_deref()
        }
    };
    extract::extract_file(path, mime)
}

/// A full-text index that can be shared between threads by reference.
///
/// Dropping the indexer closes the index. Search sessions only hold a weak
/// reference and report no further results once it is gone.
pub struct SearchIndexer<E: IndexEngine = LocalEngine> {
    shared: Arc<Shared<E>>,
}

impl SearchIndexer<LocalEngine> {
    /// An index that lives only as long as this value
    pub fn create_in_memory(config: IndexConfig) -> Self {
        Self::with_engine(LocalEngine::in_memory(config))
    }

    /// A new index backed by `path`. Fails if the file already exists.
    pub fn create_file(path: impl AsRef<Path>, config: IndexConfig) -> anyhow::Result<Self> {
        Ok(Self::with_engine(LocalEngine::create(path, config)?))
    }

    /// Open an index previously created with [`Self::create_file`]
    pub fn open_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::with_engine(LocalEngine::open(path)?))
    }

    /// Open `path` if it exists, otherwise create it with `config`.
    ///
    /// An existing index keeps the settings it was built with.
    pub fn open_or_create(path: impl AsRef<Path>, config: IndexConfig) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Self::create_file(path, config);
        }

        let engine = LocalEngine::open(path)?;
        if engine.config().fingerprint() != config.fingerprint() {
            warn!(
                path = %path.display(),
                "Index was built with different settings, keeping the stored ones"
            );
        }
        Ok(Self::with_engine(engine))
    }

    /// Build the index described by a configuration file
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match &config.storage.path {
            Some(path) => Self::open_or_create(path, config.index_config()),
            None => Ok(Self::create_in_memory(config.index_config())),
        }
    }
}

impl<E: IndexEngine> SearchIndexer<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(Some(engine)),
            }),
        }
    }

    /// Stage `text` as the content of `url`.
    ///
    /// `true` does not mean the content changed: an identical text, or an
    /// existing document with `can_replace == false`, also reports success.
    /// Use [`Self::add_text_with_outcome`] to tell these apart.
    pub fn add_text(&self, url: &Url, text: &str, can_replace: bool) -> bool {
        self.add_text_with_outcome(url, text, can_replace)
            .is_success()
    }

    pub fn add_text_with_outcome(&self, url: &Url, text: &str, can_replace: bool) -> AddOutcome {
        self.stage_text(url.as_str(), text, can_replace)
    }

    /// [`Self::add_text`] for a URL that still has to be parsed.
    ///
    /// The document is keyed on `url` exactly as given: strings that parse
    /// to the same normalized URL stay distinct documents.
    pub fn add_text_str(&self, url: &str, text: &str, can_replace: bool) -> bool {
        if let Err(e) = Url::parse(url) {
            log_failure("add_text", url, &EngineError::InvalidUrl(e.to_string()));
            return false;
        }
        self.stage_text(url, text, can_replace).is_success()
    }

    fn stage_text(&self, key: &str, text: &str, can_replace: bool) -> AddOutcome {
        let result = self
            .shared
            .with_open(|engine| engine.add_text(key, text, can_replace));
        add_outcome("add_text", key, result)
    }

    /// Extract the file at `url` and stage its text. Requires
    /// [`extract::ensure_loaded`] to have been called.
    ///
    /// Without a MIME hint the type is detected from the file. Like
    /// [`Self::add_text`], `true` does not guarantee the content changed.
    pub fn add_file(&self, url: &Url, mime_hint: Option<&str>, can_replace: bool) -> bool {
        self.add_file_with_outcome(url, mime_hint, can_replace)
            .is_success()
    }

    pub fn add_file_with_outcome(
        &self,
        url: &Url,
        mime_hint: Option<&str>,
        can_replace: bool,
    ) -> AddOutcome {
        let result = self.stage_file(url, mime_hint, can_replace);
        add_outcome("add_file", url.as_str(), result)
    }

    fn stage_file(&self, url: &Url, mime_hint: Option<&str>, can_replace: bool) -> Result<AddOutcome> {
        if !extract::is_loaded() {
            return Err(EngineError::ExtractorsNotLoaded);
        }
        let path = file_path(url)?;
        if self.is_closed() {
            return Err(EngineError::Closed);
        }

        let text = extract_text(&path, mime_hint)?;
        self.shared
            .with_open(|engine| engine.add_text(url.as_str(), &text, can_replace))
    }

    /// [`Self::add_file`] for a filesystem path
    pub fn add_file_path(&self, path: &Path, mime_hint: Option<&str>, can_replace: bool) -> bool {
        let url = std::path::absolute(path)
            .ok()
            .and_then(|absolute| Url::from_file_path(absolute).ok());
        match url {
            Some(url) => self.add_file(&url, mime_hint, can_replace),
            None => {
                let err = EngineError::InvalidUrl(path.display().to_string());
                log_failure("add_file", &path.to_string_lossy(), &err);
                false
            }
        }
    }

    /// Add every file under the folder at `folder`, recursively.
    ///
    /// Returns the URLs whose add reported success. Anything that is not a
    /// directory yields an empty list and leaves the index untouched.
    /// No file is skipped for its size; use [`Self::add_folder_with`] to set
    /// excludes or a size limit.
    pub fn add_folder(&self, folder: &Url, can_replace: bool) -> Vec<Url> {
        self.add_folder_with(folder, &FileDiscoveryConfig::unlimited(), can_replace)
    }

    pub fn add_folder_with(
        &self,
        folder: &Url,
        discovery: &FileDiscoveryConfig,
        can_replace: bool,
    ) -> Vec<Url> {
        let dir = match file_path(folder) {
            Ok(dir) if dir.is_dir() => dir,
            _ => {
                debug!(url = %folder, "Not a directory, nothing to add");
                return Vec::new();
            }
        };
        if !extract::is_loaded() {
            log_failure("add_folder", folder.as_str(), &EngineError::ExtractorsNotLoaded);
            return Vec::new();
        }
        if self.is_closed() {
            log_failure("add_folder", folder.as_str(), &EngineError::Closed);
            return Vec::new();
        }

        let files: Vec<PathBuf> = list_all_files(&dir, discovery).collect();

        // Extraction is independent per file; only the adds need the engine
        let extracted: Vec<(Url, Result<String>)> = files
            .par_iter()
            .filter_map(|path| {
                let url = Url::from_file_path(path).ok()?;
                Some((url, extract_text(path, None)))
            })
            .collect();

        let mut added = Vec::with_capacity(extracted.len());
        for (url, text) in extracted {
            let result = text.and_then(|text| {
                self.shared
                    .with_open(|engine| engine.add_text(url.as_str(), &text, can_replace))
            });
            if add_outcome("add_file", url.as_str(), result).is_success() {
                added.push(url);
            }
        }

        info!(
            folder = %dir.display(),
            discovered = files.len(),
            added = added.len(),
            "Folder added"
        );
        added
    }

    /// Stage removal of `url`. Succeeds whether or not it was indexed.
    pub fn remove(&self, url: &Url) -> bool {
        match self
            .shared
            .with_open(|engine| engine.remove_document(url.as_str()))
        {
            Ok(()) => {
                debug!(url = %url, "Document removal staged");
                true
            }
            Err(e) => {
                log_failure("remove", url.as_str(), &e);
                false
            }
        }
    }

    /// Remove each URL in turn, ignoring individual failures
    pub fn remove_all<'a>(&self, urls: impl IntoIterator<Item = &'a Url>) {
        for url in urls {
            self.remove(url);
        }
    }

    /// Current state of `url`, read from the engine.
    /// A closed index reports every document as not indexed.
    pub fn document_state(&self, url: &Url) -> DocumentState {
        self.document_state_str(url.as_str())
    }

    /// [`Self::document_state`] for a key staged with [`Self::add_text_str`]
    pub fn document_state_str(&self, url: &str) -> DocumentState {
        self.shared.serialized(|slot| {
            slot.as_ref()
                .map_or(DocumentState::NotIndexed, |engine| engine.document_state(url))
        })
    }

    pub fn is_indexed(&self, url: &Url) -> bool {
        self.document_state(url) == DocumentState::Indexed
    }

    /// Make every staged change searchable
    pub fn flush(&self) -> bool {
        match self.shared.with_open(|engine| engine.flush()) {
            Ok(()) => true,
            Err(e) => {
                log_failure("flush", "", &e);
                false
            }
        }
    }

    /// Flush and release the engine. Later calls do nothing.
    pub fn close(&self) {
        self.shared.serialized(|slot| {
            if let Some(engine) = slot.take() {
                match engine.close() {
                    Ok(()) => debug!("Index closed"),
                    Err(e) => warn!(error = %e, "Index closed with errors"),
                }
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.shared.serialized(|slot| slot.is_none())
    }

    /// Stop words the index was created with; empty once closed
    pub fn stop_words(&self) -> StopWordSet {
        self.shared.serialized(|slot| {
            slot.as_ref()
                .map(|engine| engine.config().stop_words().clone())
                .unwrap_or_default()
        })
    }

    /// Number of searchable documents; 0 once closed
    pub fn document_count(&self) -> usize {
        self.shared
            .serialized(|slot| slot.as_ref().map_or(0, |engine| engine.document_count()))
    }

    pub fn config(&self) -> Option<IndexConfig> {
        self.shared
            .serialized(|slot| slot.as_ref().map(|engine| engine.config().clone()))
    }

    /// Start a search over the documents committed so far.
    pub fn progressive_search(&self, query: &str, options: SearchOptions) -> ProgressiveSearch<E> {
        let cancel = CancelToken::new();
        let cursor = self.shared.serialized(|slot| {
            slot.as_ref()
                .map(|engine| engine.create_search(query, options, cancel.clone()))
        });
        if cursor.is_none() {
            debug!(query, "Search started on a closed index");
        }
        ProgressiveSearch::new(Arc::downgrade(&self.shared), query, options, cursor, cancel)
    }

    /// Run `query` to completion, `limit` results per batch
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let session = self.progressive_search(query, SearchOptions::default());
        let mut results = Vec::new();
        loop {
            let batch = session.next(limit, DRAIN_TIMEOUT);
            results.extend(batch.results);
            if !batch.more_results_available {
                return results;
            }
        }
    }
}

impl<E: IndexEngine> Drop for SearchIndexer<E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_unknown_url_state_and_remove() {
        let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
        let never = url("doc://never");
        assert_eq!(indexer.document_state(&never), DocumentState::NotIndexed);
        assert!(indexer.remove(&never));
    }

    #[test]
    fn test_add_flush_indexed() {
        let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
        let a = url("doc://a");
        assert!(indexer.add_text(&a, "the quick fox", false));
        assert_eq!(indexer.document_state(&a), DocumentState::AddPending);
        assert!(indexer.flush());
        assert!(indexer.is_indexed(&a));
        assert_eq!(indexer.document_count(), 1);
    }

    #[test]
    fn test_add_quirk_reports_success_without_change() {
        let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
        let a = url("doc://a");
        assert!(indexer.add_text(&a, "first", false));
        assert!(indexer.add_text(&a, "second", false));
        assert_eq!(
            indexer.add_text_with_outcome(&a, "second", false),
            AddOutcome::Unchanged
        );
    }

    #[test]
    fn test_add_text_str_rejects_bad_url() {
        let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
        assert!(!indexer.add_text_str("not a url", "text", false));
        assert!(indexer.add_text_str("doc://a", "text", false));
    }

    #[test]
    fn test_add_text_str_keeps_caller_spelling() {
        let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
        let upper = "HTTP://Example.COM/docs/../b";
        let lower = "http://example.com/b";
        assert!(indexer.add_text_str(upper, "alpha", false));
        assert!(indexer.add_text_str(lower, "beta", false));
        assert_eq!(indexer.document_state_str(upper), DocumentState::AddPending);
        assert_eq!(indexer.document_state_str(lower), DocumentState::AddPending);

        assert!(indexer.flush());
        assert_eq!(indexer.document_count(), 2);
        assert_eq!(indexer.search("beta", 10).len(), 1);
        assert_eq!(indexer.search("alpha", 10).len(), 1);
        assert!(indexer.is_indexed(&url(lower)));
    }

    #[test]
    fn test_closed_index_fails_gracefully() {
        let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
        let a = url("doc://a");
        indexer.add_text(&a, "fox", false);
        indexer.flush();

        indexer.close();
        indexer.close();
        assert!(indexer.is_closed());
        assert!(!indexer.add_text(&a, "fox", true));
        assert!(!indexer.remove(&a));
        assert!(!indexer.flush());
        assert_eq!(indexer.document_state(&a), DocumentState::NotIndexed);
        assert_eq!(indexer.document_count(), 0);
        assert!(indexer.config().is_none());
        assert!(indexer.stop_words().is_empty());
        assert!(indexer.search("fox", 10).is_empty());
    }

    #[test]
    fn test_stop_words_accessor() {
        let config = IndexConfig::new(
            crate::config::IndexVariant::Inverted,
            false,
            ["The", "a"].into_iter().collect(),
            1,
        );
        let indexer = SearchIndexer::create_in_memory(config);
        let stop_words = indexer.stop_words();
        assert_eq!(stop_words.len(), 2);
        assert!(stop_words.contains("the"));
    }
}
