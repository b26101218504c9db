//! The index engine capability the facade orchestrates.
//!
//! An engine is not safe for concurrent use: every method takes either
//! `&self` or `&mut self` and the facade guarantees that at most one call is
//! in flight at a time. Cursors are owned by their search session and are only
//! advanced while that same guarantee holds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::IndexConfig;
use crate::error::Result;

/// Engine-assigned document identifier
pub type DocumentId = u32;

/// Indexing state of a document, always read fresh from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentState {
    NotIndexed,
    Indexed,
    /// Added or replaced, waiting for the next flush
    AddPending,
    /// Removed, waiting for the next flush
    DeletePending,
}

/// What an add actually did to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddOutcome {
    Created,
    Replaced,
    /// The call succeeded but the document content did not change, either
    /// because it was identical or because replacement was not allowed
    Unchanged,
    Failed,
}

impl AddOutcome {
    /// The boolean reported by the facade's plain add methods.
    /// `Unchanged` counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self, AddOutcome::Failed)
    }

    pub fn changed_content(&self) -> bool {
        matches!(self, AddOutcome::Created | AddOutcome::Replaced)
    }
}

/// Search-mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SearchOptions {
    /// Whitespace between terms means OR instead of AND
    pub space_means_or: bool,
    /// Skip scoring; matches come back in document order with score 0
    pub no_relevance_scores: bool,
    /// Treat the query as example text and rank by similarity to it
    pub find_similar: bool,
}

/// Shared flag that asks a cursor to stop advancing
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Matches produced by one cursor advance, in relevance order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineBatch {
    pub matches: Vec<(DocumentId, f32)>,
    /// Whether the cursor may produce more matches
    pub has_more: bool,
}

impl EngineBatch {
    pub fn finished(matches: Vec<(DocumentId, f32)>) -> Self {
        Self {
            matches,
            has_more: false,
        }
    }
}

/// Add/remove/search primitives over one open index.
pub trait IndexEngine: Send + 'static {
    /// Live, resumable search state
    type Cursor: Send + 'static;

    fn config(&self) -> &IndexConfig;

    /// Stage `text` as the content of `url`.
    fn add_text(&mut self, url: &str, text: &str, can_replace: bool) -> Result<AddOutcome>;

    /// Stage removal of `url`. Unknown URLs are not an error.
    fn remove_document(&mut self, url: &str) -> Result<()>;

    fn document_state(&self, url: &str) -> DocumentState;

    /// Number of searchable (committed) documents
    fn document_count(&self) -> usize;

    /// Make staged changes searchable.
    fn flush(&mut self) -> Result<()>;

    /// Release the index, persisting it if it has a location.
    fn close(self) -> Result<()>
    where
        Self: Sized;

    fn create_search(&self, query: &str, options: SearchOptions, cancel: CancelToken)
        -> Self::Cursor;

    /// Produce up to `limit` further matches, spending at most roughly
    /// `timeout` before returning whatever is ready.
    fn advance_search(
        &self,
        cursor: &mut Self::Cursor,
        limit: usize,
        timeout: Duration,
    ) -> EngineBatch;

    /// Map ids to document URLs; ids no longer in the index map to `None`.
    fn resolve_urls(&self, ids: &[DocumentId]) -> Vec<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_outcome_success() {
        assert!(AddOutcome::Created.is_success());
        assert!(AddOutcome::Unchanged.is_success());
        assert!(!AddOutcome::Failed.is_success());
        assert!(!AddOutcome::Unchanged.changed_content());
        assert!(AddOutcome::Replaced.changed_content());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
