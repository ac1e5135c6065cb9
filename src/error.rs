use std::path::PathBuf;

use thiserror::Error;

/// Main error type for cordex operations
#[derive(Error, Debug)]
pub enum CordexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt index file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Segment failed to load: {0}")]
    SegmentLoad(String),

    #[error("Invalid segment data: {0}")]
    InvalidSegment(String),
}

/// Result type alias for cordex operations
pub type Result<T> = std::result::Result<T, CordexError>;

impl CordexError {
    /// Build a corruption error for a specific index file
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CordexError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
