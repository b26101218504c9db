use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the index engine and its collaborators.
///
/// The public facade never hands these to callers directly; they are logged
/// and folded into `false` / empty results.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("index is closed")]
    Closed,

    #[error("invalid document url: {0}")]
    InvalidUrl(String),

    #[error("content extractors are not loaded")]
    ExtractorsNotLoaded,

    #[error("no content extractor for mime type {0}")]
    UnsupportedMime(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("content extraction failed: {0}")]
    Extraction(String),

    #[error("persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Precondition failures are expected in normal operation and are logged
    /// at a lower level than genuine engine failures.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::Closed | EngineError::InvalidUrl(_) | EngineError::ExtractorsNotLoaded
        )
    }
}
