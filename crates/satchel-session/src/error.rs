//! Error types for session store operations.

use std::path::PathBuf;

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sessions cannot be used at all (disabled backend, unusable storage
    /// after fallback). Never retried.
    #[error("Session configuration error: {0}")]
    Configuration(String),

    /// The backend could not write to its save directory.
    #[error("Session storage not writable at {}: {reason}", path.display())]
    StorageUnwritable { path: PathBuf, reason: String },

    /// Backend-specific failure.
    #[error("Session backend error: {0}")]
    Backend(String),

    /// IO error from a file-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a hard configuration failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
