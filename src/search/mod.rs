pub mod file_discovery;
pub mod indexer;
pub mod progressive;

pub use file_discovery::{list_all_files, FileDiscoveryConfig, FileDiscoveryIterator};
pub use indexer::SearchIndexer;
pub use progressive::{ProgressiveSearch, SearchResult, SearchResults, SessionState};
