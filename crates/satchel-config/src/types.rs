//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [session]
//! save_dir = "/var/lib/app/sessions"
//! fallback_dir = "./tmp"
//! force_compute = false
//! ```
//!
//! # Environment Variables
//!
//! - `SATCHEL_SESSION_DIR` - Override the session save directory
//! - `SATCHEL_FALLBACK_DIR` - Override the storage fallback directory
//! - `SATCHEL_FORCE_SESSION_COMPUTE` - Force every memoized computation ("true"/"1")

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`SessionSection::save_dir`].
pub const SESSION_DIR_ENV: &str = "SATCHEL_SESSION_DIR";

/// Environment variable overriding [`SessionSection::fallback_dir`].
pub const FALLBACK_DIR_ENV: &str = "SATCHEL_FALLBACK_DIR";

/// Environment variable overriding [`SessionSection::force_compute`].
pub const FORCE_COMPUTE_ENV: &str = "SATCHEL_FORCE_SESSION_COMPUTE";

/// Root configuration structure.
///
/// All fields are optional so partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatchelConfig {
    /// Session storage configuration.
    pub session: SessionSection,
}

impl SatchelConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: SatchelConfig) {
        self.session.merge(other.session);
    }
}

/// The `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Directory where file-backed sessions are written.
    /// Default: the system temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,

    /// Writable directory used when `save_dir` cannot be written.
    /// Default: `./tmp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_dir: Option<PathBuf>,

    /// Force every memoized computation to run.
    /// Default: false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_compute: Option<bool>,
}

impl SessionSection {
    /// Merge another section on top of this one (other takes priority).
    pub fn merge(&mut self, other: SessionSection) {
        if other.save_dir.is_some() {
            self.save_dir = other.save_dir;
        }
        if other.fallback_dir.is_some() {
            self.fallback_dir = other.fallback_dir;
        }
        if other.force_compute.is_some() {
            self.force_compute = other.force_compute;
        }
    }

    /// Get the effective save directory, checking the environment first.
    ///
    /// Resolution order:
    /// 1. `SATCHEL_SESSION_DIR` environment variable
    /// 2. Configured `save_dir` value
    /// 3. Default: the system temp directory
    pub fn effective_save_dir(&self) -> PathBuf {
        self.save_dir_with_env(env_value(SESSION_DIR_ENV))
    }

    /// Get the effective fallback directory, checking the environment first.
    ///
    /// `None` leaves the choice to the session store.
    pub fn effective_fallback_dir(&self) -> Option<PathBuf> {
        self.fallback_dir_with_env(env_value(FALLBACK_DIR_ENV))
    }

    /// Check if forced computation is enabled (respects env var).
    pub fn force_compute_enabled(&self) -> bool {
        self.force_compute_with_env(env_value(FORCE_COMPUTE_ENV))
    }

    fn save_dir_with_env(&self, env: Option<String>) -> PathBuf {
        env.map(PathBuf::from)
            .or_else(|| self.save_dir.clone())
            .unwrap_or_else(std::env::temp_dir)
    }

    fn fallback_dir_with_env(&self, env: Option<String>) -> Option<PathBuf> {
        env.map(PathBuf::from).or_else(|| self.fallback_dir.clone())
    }

    fn force_compute_with_env(&self, env: Option<String>) -> bool {
        match env {
            Some(raw) => parse_flag(&raw),
            None => self.force_compute.unwrap_or(false),
        }
    }
}

/// Interpret an environment flag: `true` (any case) or `1` is on.
pub fn parse_flag(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("true") || raw == "1"
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
