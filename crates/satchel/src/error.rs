//! Error types for opening a Satchel session.

use satchel_config::ConfigError;

/// Error type for opening a Satchel session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The session store could not be opened.
    #[error("Session error: {0}")]
    Session(#[from] satchel_session::Error),
}

/// Result type for opening a Satchel session.
pub type Result<T> = std::result::Result<T, Error>;
