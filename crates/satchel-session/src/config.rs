//! Configuration for opening a session store.

use std::path::PathBuf;

/// Directory name used for storage fallback when none is configured.
/// Resolved against the current working directory.
pub const DEFAULT_FALLBACK_DIR: &str = "tmp";

/// Configuration for [`SessionStore::open`](crate::SessionStore::open).
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Writable directory to switch the backend to when its own save
    /// directory is unusable. Created if absent.
    pub fallback_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback directory.
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    /// Get the fallback directory, defaulting to `./tmp`.
    pub fn effective_fallback_dir(&self) -> PathBuf {
        self.fallback_dir.clone().unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DEFAULT_FALLBACK_DIR)
        })
    }
}
