//! Key naming and compute policies.
//!
//! ```text
//! <prefix>:<session-id>      composite key holding the memoized value
//! <prefix>:_was-computed     marker set once the computation has run
//! ```

use satchel_session::TTL_SUFFIX;

use crate::error::{Error, Result};

/// Suffix identifying the computed marker of any prefix.
pub const COMPUTED_MARKER_SUFFIX: &str = ":_was-computed";

/// Builds cache keys from a prefix and the current session id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKeyPolicy {
    prefix: Option<String>,
}

impl CacheKeyPolicy {
    /// Create a policy with no prefix. Keyed operations fail until one is set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy for `prefix`.
    pub fn for_prefix(prefix: impl Into<String>) -> Self {
        Self::new().with_prefix(prefix)
    }

    /// Set the prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The configured prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Composite key `<prefix>:<session_id>`.
    pub fn key(&self, session_id: &str) -> Result<String> {
        let prefix = self.prefix.as_deref().ok_or(Error::PrefixUnset)?;
        Ok(format!("{prefix}:{session_id}"))
    }

    /// Marker key `<prefix>:_was-computed`.
    pub fn computed_marker(&self) -> Result<String> {
        let prefix = self.prefix.as_deref().ok_or(Error::PrefixUnset)?;
        Ok(format!("{prefix}{COMPUTED_MARKER_SUFFIX}"))
    }

    /// Whether `candidate` is a stale entry for this prefix.
    ///
    /// TTL shadow keys follow the key they belong to, so the current key's
    /// shadow and marker shadows are kept while stale shadows go.
    pub fn is_sibling(&self, candidate: &str, current_key: &str) -> bool {
        let Some(prefix) = self.prefix.as_deref() else {
            return false;
        };
        let base = candidate.strip_suffix(TTL_SUFFIX).unwrap_or(candidate);
        base.starts_with(prefix)
            && base != current_key
            && !base.ends_with(COMPUTED_MARKER_SUFFIX)
    }
}

/// Process-wide compute override, resolved once and injected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputePolicy {
    /// Force every `get_or` to run its computation.
    pub force_compute: bool,
}

impl ComputePolicy {
    /// A policy that forces computation everywhere.
    pub fn forced() -> Self {
        Self {
            force_compute: true,
        }
    }
}
