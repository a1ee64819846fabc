//! Clocks and shadow keys for lazy per-key expiry.
//!
//! A key stored with a TTL gets a companion `<key>__duration` entry holding
//! its absolute expiry as Unix epoch seconds. Nothing sweeps these; the
//! store checks the shadow key whenever the key is read.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

/// Suffix appended to a key to form its expiry shadow key.
pub const TTL_SUFFIX: &str = "__duration";

/// Name of the shadow key holding `key`'s expiry timestamp.
pub fn shadow_key(key: &str) -> String {
    format!("{key}{TTL_SUFFIX}")
}

/// Absolute expiry for a TTL starting at `now`.
pub fn expires_at(now: i64, ttl: Duration) -> i64 {
    let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now.saturating_add(secs)
}

/// State of a key according to its shadow entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// No shadow key; the entry never expires.
    Unbounded,
    /// Expires at the given timestamp, still live.
    Live(i64),
    /// Expired at the given timestamp.
    Expired(i64),
    /// Shadow key exists but does not hold an integer timestamp.
    Malformed,
}

impl Expiry {
    /// Classify a shadow value against the current time.
    pub fn classify(shadow: Option<&Value>, now: i64) -> Self {
        match shadow {
            None => Expiry::Unbounded,
            Some(raw) => match raw.as_i64() {
                Some(at) if now >= at => Expiry::Expired(at),
                Some(at) => Expiry::Live(at),
                None => Expiry::Malformed,
            },
        }
    }
}

/// Source of the current time for expiry checks.
pub trait Clock: Debug + Send + Sync {
    /// Current time as Unix epoch seconds.
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let secs = i64::try_from(by.as_secs()).unwrap_or(i64::MAX);
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
