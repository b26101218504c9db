//! Local full-text indexing with progressive search.
//!
//! Documents are identified by URL and added as text or extracted from files.
//! A [`SearchIndexer`] serializes every operation on its index, and a
//! [`ProgressiveSearch`] session hands out ranked results in batches bounded
//! by a count and a time budget.
//!
//! ```no_run
//! use progressive_search::{IndexConfig, SearchIndexer, SearchOptions};
//! use std::time::Duration;
//! use url::Url;
//!
//! let indexer = SearchIndexer::create_in_memory(IndexConfig::default());
//! let url = Url::parse("doc://a").unwrap();
//! indexer.add_text(&url, "the quick fox", false);
//! indexer.flush();
//!
//! let session = indexer.progressive_search("quick", SearchOptions::default());
//! loop {
//!     let batch = session.next(10, Duration::from_millis(100));
//!     for result in &batch.results {
//!         println!("{} {:.3}", result.url, result.score);
//!     }
//!     if !batch.more_results_available {
//!         break;
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod search;
pub mod telemetry;
pub mod utils;

pub use config::{Config, IndexConfig, IndexVariant, StopWordSet};
pub use error::EngineError;
pub use index::{AddOutcome, DocumentState, IndexEngine, LocalEngine, SearchOptions};
pub use search::{
    FileDiscoveryConfig, ProgressiveSearch, SearchIndexer, SearchResult, SearchResults,
    SessionState,
};
