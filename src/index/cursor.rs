//! Resumable search cursor for the local engine.
//!
//! A cursor goes through two phases. While scoring, it walks the candidate
//! documents in chunks and gives up for this call once the deadline passes,
//! keeping its place. Once every candidate is scored, the matches are sorted
//! and handed out `limit` at a time.

use std::time::{Duration, Instant};

use super::engine::{CancelToken, DocumentId, EngineBatch};
use super::query::Query;
use super::scoring::{bm25_score, idf, sparse_cosine};
use super::store::{DocumentStore, StoredDocument};

/// Candidates scored between deadline and cancellation checks
const SCORE_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMode {
    Bm25,
    /// Cosine similarity of tf-idf vectors
    Similarity,
    /// Every match scores 0 and keeps document order
    Unscored,
}

#[derive(Debug)]
enum Phase {
    Pending,
    Scoring {
        candidates: Vec<DocumentId>,
        next: usize,
        scored: Vec<(DocumentId, f32)>,
    },
    Ranked {
        results: Vec<(DocumentId, f32)>,
        next: usize,
    },
    Finished,
}

#[derive(Debug)]
pub struct LocalCursor {
    query: Query,
    mode: RankingMode,
    cancel: CancelToken,
    phase: Phase,
}

impl LocalCursor {
    pub fn new(query: Query, mode: RankingMode, cancel: CancelToken) -> Self {
        Self {
            query,
            mode,
            cancel,
            phase: Phase::Pending,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    pub fn advance(&mut self, store: &DocumentStore, limit: usize, timeout: Duration) -> EngineBatch {
        let deadline = Instant::now() + timeout;
        let limit = limit.max(1);

        loop {
            if self.cancel.is_cancelled() {
                self.phase = Phase::Finished;
                return EngineBatch::finished(Vec::new());
            }

            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Pending => {
                    let candidates: Vec<DocumentId> = if self.query.is_empty() {
                        Vec::new()
                    } else {
                        self.query.candidates(store).iter().collect()
                    };
                    tracing::trace!(candidates = candidates.len(), "Search cursor started");
                    self.phase = Phase::Scoring {
                        scored: Vec::with_capacity(candidates.len()),
                        candidates,
                        next: 0,
                    };
                }
                Phase::Scoring {
                    candidates,
                    next,
                    mut scored,
                } => {
                    let end = (next + SCORE_CHUNK).min(candidates.len());
                    let scorer = Scorer::new(&self.query, self.mode, store);
                    for &id in &candidates[next..end] {
                        // Documents removed by a flush since the cursor started are skipped
                        let Some(doc) = store.get(id) else {
                            continue;
                        };
                        if self.query.matches(doc) {
                            scored.push((id, scorer.score(doc)));
                        }
                    }

                    if end >= candidates.len() {
                        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                        self.phase = Phase::Ranked {
                            results: scored,
                            next: 0,
                        };
                        continue;
                    }

                    self.phase = Phase::Scoring {
                        candidates,
                        next: end,
                        scored,
                    };
                    if Instant::now() >= deadline {
                        return EngineBatch {
                            matches: Vec::new(),
                            has_more: true,
                        };
                    }
                }
                Phase::Ranked { results, next } => {
                    let end = (next + limit).min(results.len());
                    let matches = results[next..end].to_vec();
                    if end < results.len() {
                        self.phase = Phase::Ranked { results, next: end };
                        return EngineBatch {
                            matches,
                            has_more: true,
                        };
                    }
                    return EngineBatch::finished(matches);
                }
                Phase::Finished => return EngineBatch::finished(Vec::new()),
            }
        }
    }
}

/// Per-advance scoring context; the query vector is computed once per chunk
struct Scorer<'a> {
    query: &'a Query,
    mode: RankingMode,
    store: &'a DocumentStore,
    total_docs: f32,
    avg_len: f32,
    query_vector: Vec<(String, f32)>,
}

impl<'a> Scorer<'a> {
    fn new(query: &'a Query, mode: RankingMode, store: &'a DocumentStore) -> Self {
        let total_docs = store.len() as f32;
        let query_vector = if mode == RankingMode::Similarity {
            query
                .term_vector(store)
                .into_iter()
                .map(|(term, tf)| {
                    let df = store.postings().doc_freq(&term) as f32;
                    let weight = tf as f32 * idf(df, total_docs);
                    (term, weight)
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            query,
            mode,
            store,
            total_docs,
            avg_len: store.avg_length(),
            query_vector,
        }
    }

    fn score(&self, doc: &StoredDocument) -> f32 {
        match self.mode {
            RankingMode::Unscored => 0.0,
            RankingMode::Bm25 => self
                .query
                .matched_terms(doc)
                .into_iter()
                .map(|term| {
                    bm25_score(
                        doc.term_freq(term) as f32,
                        self.store.postings().doc_freq(term) as f32,
                        self.total_docs,
                        doc.length as f32,
                        self.avg_len,
                    )
                })
                .sum(),
            RankingMode::Similarity => {
                let mut doc_vector: Vec<(&str, f32)> = doc
                    .term_freqs
                    .iter()
                    .map(|(term, &tf)| {
                        let df = self.store.postings().doc_freq(term) as f32;
                        (term.as_str(), tf as f32 * idf(df, self.total_docs))
                    })
                    .collect();
                doc_vector.sort_by(|a, b| a.0.cmp(b.0));
                let query_vector: Vec<(&str, f32)> = self
                    .query_vector
                    .iter()
                    .map(|(term, weight)| (term.as_str(), *weight))
                    .collect();
                sparse_cosine(&query_vector, &doc_vector)
            }
        }
    }
}
