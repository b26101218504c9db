use anyhow::Context;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cursor::{LocalCursor, RankingMode};
use super::engine::{
    AddOutcome, CancelToken, DocumentId, DocumentState, EngineBatch, IndexEngine, SearchOptions,
};
use super::persistence::PersistedIndex;
use super::query::Query;
use super::store::DocumentStore;
use super::tokenizer::{Analysis, Tokenizer};
use crate::config::{IndexConfig, IndexVariant};
use crate::error::Result;

/// Analysed text waiting for the next flush
#[derive(Debug)]
struct PendingDocument {
    digest: [u8; 16],
    analysis: Analysis,
}

#[derive(Debug)]
enum PendingChange {
    Add(PendingDocument),
    Delete,
}

/// Built-in engine: an in-memory inverted index with a flush boundary,
/// optionally snapshotted to a file.
#[derive(Debug)]
pub struct LocalEngine {
    config: IndexConfig,
    tokenizer: Tokenizer,
    location: Option<PathBuf>,
    store: DocumentStore,
    pending: FxHashMap<String, PendingChange>,
    /// Committed state differs from the file at `location`
    dirty: bool,
}

impl LocalEngine {
    fn with_store(config: IndexConfig, location: Option<PathBuf>, store: DocumentStore) -> Self {
        if config.variant() == IndexVariant::Unknown {
            warn!("Index variant is unknown, analysing as an inverted index");
        }
        Self {
            tokenizer: Tokenizer::new(&config),
            config,
            location,
            store,
            pending: FxHashMap::default(),
            dirty: false,
        }
    }

    /// Create an index that lives only in memory
    pub fn in_memory(config: IndexConfig) -> Self {
        Self::with_store(config, None, DocumentStore::new())
    }

    /// Create a new index file at `path`. Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>, config: IndexConfig) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            anyhow::bail!("Index file already exists: {}", path.display());
        }
        let engine = Self::with_store(config, Some(path.to_path_buf()), DocumentStore::new());
        engine.persist()?;
        info!(path = %path.display(), "Created index file");
        Ok(engine)
    }

    /// Open an existing index file
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let persisted = PersistedIndex::load(path)?;
        let (config, store) = persisted
            .into_store()
            .with_context(|| format!("Failed to restore index: {}", path.display()))?;
        info!(
            path = %path.display(),
            documents = store.len(),
            terms = store.postings().num_terms(),
            "Opened index file"
        );
        Ok(Self::with_store(config, Some(path.to_path_buf()), store))
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Number of staged adds and deletes
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.location else {
            return Ok(());
        };
        PersistedIndex::new(&self.config, &self.store)?.save(path)?;
        if let Ok(meta) = std::fs::metadata(path) {
            debug!(
                path = %path.display(),
                size = %crate::utils::format_bytes(meta.len()),
                "Index saved"
            );
        }
        Ok(())
    }

    fn ranking_mode(&self, options: SearchOptions) -> RankingMode {
        let variant = self.config.variant();
        if options.no_relevance_scores {
            RankingMode::Unscored
        } else if variant.is_vector_only() || (options.find_similar && variant.has_vector()) {
            RankingMode::Similarity
        } else {
            RankingMode::Bm25
        }
    }
}

impl IndexEngine for LocalEngine {
    type Cursor = LocalCursor;

    fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn add_text(&mut self, url: &str, text: &str, can_replace: bool) -> Result<AddOutcome> {
        let digest = md5::compute(text.as_bytes()).0;
        let existing = match self.pending.get(url) {
            Some(PendingChange::Add(doc)) => Some(doc.digest),
            Some(PendingChange::Delete) => None,
            None => self.store.get_by_url(url).map(|doc| doc.digest),
        };

        let outcome = match existing {
            Some(_) if !can_replace => return Ok(AddOutcome::Unchanged),
            Some(current) if current == digest => return Ok(AddOutcome::Unchanged),
            Some(_) => AddOutcome::Replaced,
            None => AddOutcome::Created,
        };

        let analysis = self
            .tokenizer
            .analyze(text, self.config.proximity_indexing());
        self.pending.insert(
            url.to_string(),
            PendingChange::Add(PendingDocument { digest, analysis }),
        );
        Ok(outcome)
    }

    fn remove_document(&mut self, url: &str) -> Result<()> {
        if self.store.contains_url(url) {
            self.pending.insert(url.to_string(), PendingChange::Delete);
        } else {
            // Never committed: dropping the staged add is enough
            self.pending.remove(url);
        }
        Ok(())
    }

    fn document_state(&self, url: &str) -> DocumentState {
        match self.pending.get(url) {
            Some(PendingChange::Add(_)) => DocumentState::AddPending,
            Some(PendingChange::Delete) => DocumentState::DeletePending,
            None if self.store.contains_url(url) => DocumentState::Indexed,
            None => DocumentState::NotIndexed,
        }
    }

    fn document_count(&self) -> usize {
        self.store.len()
    }

    fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let (mut added, mut removed) = (0usize, 0usize);

        for (url, change) in pending {
            match change {
                PendingChange::Delete => {
                    if self.store.remove(&url) {
                        removed += 1;
                    }
                }
                PendingChange::Add(doc) => {
                    self.store.insert(url, doc.digest, doc.analysis);
                    added += 1;
                }
            }
        }

        if added + removed > 0 {
            self.dirty = true;
            info!(
                added,
                removed,
                documents = self.store.len(),
                "Index flushed"
            );
        }

        if self.dirty && self.location.is_some() {
            self.persist()?;
        }
        self.dirty = false;
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        self.flush()?;
        if let Some(path) = &self.location {
            info!(path = %path.display(), "Closed index file");
        }
        Ok(())
    }

    fn create_search(
        &self,
        query: &str,
        options: SearchOptions,
        cancel: CancelToken,
    ) -> Self::Cursor {
        // Example text for similarity searches is a bag of words
        let space_means_or = options.space_means_or || options.find_similar;
        let parsed = Query::parse(query, &self.tokenizer, space_means_or);
        LocalCursor::new(parsed, self.ranking_mode(options), cancel)
    }

    fn advance_search(
        &self,
        cursor: &mut Self::Cursor,
        limit: usize,
        timeout: Duration,
    ) -> EngineBatch {
        cursor.advance(&self.store, limit, timeout)
    }

    fn resolve_urls(&self, ids: &[DocumentId]) -> Vec<Option<String>> {
        ids.iter()
            .map(|id| self.store.get(*id).map(|doc| doc.url.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LONG: Duration = Duration::from_secs(5);

    fn drain(engine: &LocalEngine, query: &str, options: SearchOptions) -> Vec<String> {
        let mut cursor = engine.create_search(query, options, CancelToken::new());
        let mut urls = Vec::new();
        loop {
            let batch = engine.advance_search(&mut cursor, 10, LONG);
            let ids: Vec<u32> = batch.matches.iter().map(|m| m.0).collect();
            urls.extend(engine.resolve_urls(&ids).into_iter().flatten());
            if !batch.has_more {
                return urls;
            }
        }
    }

    #[test]
    fn test_document_state_lifecycle() {
        let mut engine = LocalEngine::in_memory(IndexConfig::default());
        assert_eq!(engine.document_state("doc://a"), DocumentState::NotIndexed);

        engine.add_text("doc://a", "quick fox", false).unwrap();
        assert_eq!(engine.document_state("doc://a"), DocumentState::AddPending);
        assert!(drain(&engine, "fox", SearchOptions::default()).is_empty());

        engine.flush().unwrap();
        assert_eq!(engine.document_state("doc://a"), DocumentState::Indexed);
        assert_eq!(drain(&engine, "fox", SearchOptions::default()), vec!["doc://a"]);

        engine.remove_document("doc://a").unwrap();
        assert_eq!(engine.document_state("doc://a"), DocumentState::DeletePending);
        engine.flush().unwrap();
        assert_eq!(engine.document_state("doc://a"), DocumentState::NotIndexed);
        assert_eq!(engine.document_count(), 0);
    }

    #[test]
    fn test_add_outcomes() {
        let mut engine = LocalEngine::in_memory(IndexConfig::default());
        assert_eq!(engine.add_text("doc://a", "one", false).unwrap(), AddOutcome::Created);
        assert_eq!(engine.add_text("doc://a", "two", false).unwrap(), AddOutcome::Unchanged);
        assert_eq!(engine.add_text("doc://a", "two", true).unwrap(), AddOutcome::Replaced);
        engine.flush().unwrap();
        assert_eq!(engine.add_text("doc://a", "two", true).unwrap(), AddOutcome::Unchanged);
        assert_eq!(engine.add_text("doc://a", "three", true).unwrap(), AddOutcome::Replaced);
        engine.flush().unwrap();
        assert_eq!(drain(&engine, "three", SearchOptions::default()), vec!["doc://a"]);
        assert!(drain(&engine, "two", SearchOptions::default()).is_empty());
    }

    #[test]
    fn test_remove_unknown_and_pending() {
        let mut engine = LocalEngine::in_memory(IndexConfig::default());
        engine.remove_document("doc://never").unwrap();
        assert_eq!(engine.pending_count(), 0);

        engine.add_text("doc://a", "fox", false).unwrap();
        engine.remove_document("doc://a").unwrap();
        assert_eq!(engine.document_state("doc://a"), DocumentState::NotIndexed);
        engine.flush().unwrap();
        assert_eq!(engine.document_count(), 0);
    }

    #[test]
    fn test_find_similar_falls_back_without_vector() {
        let mut engine = LocalEngine::in_memory(IndexConfig::default());
        engine.add_text("doc://a", "quick fox", false).unwrap();
        engine.add_text("doc://b", "lazy dog", false).unwrap();
        engine.flush().unwrap();

        let options = SearchOptions {
            find_similar: true,
            ..Default::default()
        };
        let mut urls = drain(&engine, "fox dog", options);
        urls.sort();
        assert_eq!(urls, vec!["doc://a", "doc://b"]);
        assert!(drain(&engine, "fox dog", SearchOptions::default()).is_empty());
    }

    #[test]
    fn test_file_backed_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.bin");

        let mut engine = LocalEngine::create(&path, IndexConfig::default()).unwrap();
        assert!(LocalEngine::create(&path, IndexConfig::default()).is_err());
        engine.add_text("doc://a", "apache license", false).unwrap();
        engine.close().unwrap();

        let engine = LocalEngine::open(&path).unwrap();
        assert_eq!(engine.location(), Some(path.as_path()));
        assert_eq!(engine.document_state("doc://a"), DocumentState::Indexed);
        assert_eq!(drain(&engine, "apache", SearchOptions::default()), vec!["doc://a"]);
    }
}
