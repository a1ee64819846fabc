//! Per-call options for [`MemoizedKeyCache::get_or`](crate::MemoizedKeyCache::get_or).

use std::time::Duration;

/// Options for one `get_or` call.
///
/// Options are plain values: nothing set here leaks into later calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetOrOptions {
    /// Run the computation even if a value or the computed marker exists.
    pub force_compute: bool,

    /// Skip cached values and recompute.
    pub force_refresh: bool,

    /// Store empty results (null, `false`, `0`, `""`, `[]`, `{}`) too.
    pub allow_nulls: bool,

    /// Purge stale keys for the same prefix before looking up.
    pub invalidate_siblings: bool,

    /// Expire the stored value and marker after this long.
    pub ttl: Option<Duration>,
}

impl Default for GetOrOptions {
    fn default() -> Self {
        Self {
            force_compute: false,
            force_refresh: false,
            allow_nulls: false,
            invalidate_siblings: true,
            ttl: None,
        }
    }
}

impl GetOrOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the computation to run.
    pub fn with_force_compute(mut self, force: bool) -> Self {
        self.force_compute = force;
        self
    }

    /// Force a refresh.
    pub fn with_force_refresh(mut self, refresh: bool) -> Self {
        self.force_refresh = refresh;
        self
    }

    /// Force a refresh if `predicate` returns true.
    ///
    /// The predicate runs now, not during `get_or`. A false result leaves
    /// an earlier refresh request in place.
    pub fn force_refresh_if(mut self, predicate: impl FnOnce() -> bool) -> Self {
        if predicate() {
            self.force_refresh = true;
        }
        self
    }

    /// Allow empty results to be stored.
    pub fn with_allow_nulls(mut self, allow: bool) -> Self {
        self.allow_nulls = allow;
        self
    }

    /// Enable or disable sibling invalidation.
    pub fn with_sibling_invalidation(mut self, enabled: bool) -> Self {
        self.invalidate_siblings = enabled;
        self
    }

    /// Leave stale sibling keys alone.
    pub fn without_sibling_invalidation(self) -> Self {
        self.with_sibling_invalidation(false)
    }

    /// Attach a TTL to the stored value.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Whether the cached value must be bypassed.
    pub(crate) fn bypasses_cache(&self) -> bool {
        self.force_compute || self.force_refresh
    }
}
