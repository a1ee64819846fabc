//! Error types for memoized cache operations.

/// Error type for memoized cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A keyed operation was attempted before a prefix was set.
    #[error("Cache prefix is not set; call with_prefix before using the cache")]
    PrefixUnset,

    /// Error from the underlying session store.
    #[error(transparent)]
    Session(#[from] satchel_session::Error),

    /// A computed value could not be encoded or a cached one decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a hard configuration failure.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::PrefixUnset => true,
            Error::Session(e) => e.is_configuration(),
            Error::Serialization(_) => false,
        }
    }
}

/// Result type for memoized cache operations.
pub type Result<T> = std::result::Result<T, Error>;
