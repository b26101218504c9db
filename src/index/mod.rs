pub mod cursor;
pub mod engine;
pub mod local;
pub mod persistence;
pub mod postings;
pub mod query;
pub mod scoring;
pub mod store;
pub mod tokenizer;

pub use cursor::{LocalCursor, RankingMode};
pub use engine::{
    AddOutcome, CancelToken, DocumentId, DocumentState, EngineBatch, IndexEngine, SearchOptions,
};
pub use local::LocalEngine;
pub use persistence::PersistedIndex;
pub use query::Query;
pub use tokenizer::Tokenizer;
