//! Progressive search sessions: ranked results in bounded batches.

use parking_lot::Mutex;
use std::sync::Weak;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::indexer::Shared;
use crate::index::{CancelToken, IndexEngine, SearchOptions};

/// One match. Higher scores are more relevant; the range is engine-defined.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub url: Url,
    pub score: f32,
}

/// Outcome of one [`ProgressiveSearch::next`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub more_results_available: bool,
    /// In relevance order
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    fn finished(results: Vec<SearchResult>) -> Self {
        Self {
            more_results_available: false,
            results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No batch requested yet
    Created,
    Draining,
    /// The engine reported no more matches
    Exhausted,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Exhausted | SessionState::Cancelled)
    }
}

struct SessionInner<C> {
    state: SessionState,
    /// Released as soon as the session reaches a terminal state
    cursor: Option<C>,
}

/// A resumable, cancellable query over one index.
///
/// The session holds only a weak reference to its index. Once the index is
/// closed or dropped, `next` reports no further results.
pub struct ProgressiveSearch<E: IndexEngine> {
    index: Weak<Shared<E>>,
    query: String,
    options: SearchOptions,
    cancel: CancelToken,
    inner: Mutex<SessionInner<E::Cursor>>,
}

impl<E: IndexEngine> ProgressiveSearch<E> {
    pub(crate) fn new(
        index: Weak<Shared<E>>,
        query: &str,
        options: SearchOptions,
        cursor: Option<E::Cursor>,
        cancel: CancelToken,
    ) -> Self {
        let state = if cursor.is_some() {
            SessionState::Created
        } else {
            SessionState::Exhausted
        };
        Self {
            index,
            query: query.to_string(),
            options,
            cancel,
            inner: Mutex::new(SessionInner { state, cursor }),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Fetch up to `limit` further results, waiting at most about `timeout`.
    ///
    /// Fewer results than `limit` (even none) with `more_results_available`
    /// set just means the time budget ran out first. Once a call reports no
    /// more results, every later call returns an empty, final batch.
    pub fn next(&self, limit: usize, timeout: Duration) -> SearchResults {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return SearchResults::finished(Vec::new());
        }
        if self.cancel.is_cancelled() {
            Self::finish(&mut inner, SessionState::Cancelled);
            return SearchResults::finished(Vec::new());
        }

        let Some(index) = self.index.upgrade() else {
            debug!(query = %self.query, "Index dropped, ending search");
            Self::finish(&mut inner, SessionState::Exhausted);
            return SearchResults::finished(Vec::new());
        };
        let Some(cursor) = inner.cursor.as_mut() else {
            Self::finish(&mut inner, SessionState::Exhausted);
            return SearchResults::finished(Vec::new());
        };

        let limit = limit.max(1);
        let advanced = index.serialized(|slot| {
            let engine = slot.as_ref()?;
            let batch = engine.advance_search(cursor, limit, timeout);
            let ids: Vec<_> = batch.matches.iter().map(|(id, _)| *id).collect();
            let urls = engine.resolve_urls(&ids);
            Some((batch, urls))
        });

        let Some((batch, urls)) = advanced else {
            debug!(query = %self.query, "Index closed, ending search");
            Self::finish(&mut inner, SessionState::Exhausted);
            return SearchResults::finished(Vec::new());
        };

        let found = batch.matches.len();
        let results: Vec<SearchResult> = batch
            .matches
            .into_iter()
            .zip(urls)
            .filter_map(|((_, score), url)| {
                let url = Url::parse(&url?).ok()?;
                Some(SearchResult { url, score })
            })
            .collect();
        if results.len() < found {
            trace!(dropped = found - results.len(), "Unresolvable matches dropped");
        }

        if self.cancel.is_cancelled() {
            Self::finish(&mut inner, SessionState::Cancelled);
            return SearchResults::finished(results);
        }
        if !batch.has_more {
            Self::finish(&mut inner, SessionState::Exhausted);
            return SearchResults::finished(results);
        }

        inner.state = SessionState::Draining;
        SearchResults {
            more_results_available: true,
            results,
        }
    }

    /// Stop the search. Takes effect immediately for a `next` running on
    /// another thread, which returns what it has so far.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let cursor = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Exhausted {
                inner.state = SessionState::Cancelled;
            }
            inner.cursor.take()
        };

        // Cursors belong to the engine; release them under its lock
        if let Some(cursor) = cursor {
            match self.index.upgrade() {
                Some(index) => index.serialized(|_| drop(cursor)),
                None => drop(cursor),
            }
        }
    }

    fn finish(inner: &mut SessionInner<E::Cursor>, state: SessionState) {
        inner.state = state;
        inner.cursor = None;
    }
}

impl<E: IndexEngine> Drop for ProgressiveSearch<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
