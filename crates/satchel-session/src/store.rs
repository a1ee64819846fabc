//! Session store facade with lazy per-key expiry.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::backend::{MemoryBackend, SessionBackend, SessionStatus};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::ttl::{Clock, Expiry, SystemClock, expires_at, shadow_key};

/// Thin facade over a host session backend.
///
/// This store provides:
/// - Session lifecycle (open/attach, destroy, id, status)
/// - Scalar CRUD on string keys with `serde` values
/// - Optional per-key TTL, checked lazily on `has`/`get`
///
/// One store serves one session episode. It is not shared across threads;
/// callers pass `&mut SessionStore` to whatever needs it.
#[derive(Debug)]
pub struct SessionStore<B: SessionBackend = MemoryBackend> {
    backend: B,
    clock: Arc<dyn Clock>,
}

impl<B: SessionBackend> SessionStore<B> {
    /// Attach to the backend's session, starting one if needed.
    ///
    /// A disabled backend is a configuration error. When the backend cannot
    /// write to its save directory, the fallback directory is created and
    /// the start is retried once; a second failure is a configuration error.
    pub fn open(mut backend: B, config: &StoreConfig) -> Result<Self> {
        match backend.status() {
            SessionStatus::Disabled => {
                return Err(Error::Configuration(
                    "sessions are disabled; the session store cannot be used".to_string(),
                ));
            }
            SessionStatus::None => Self::start_with_fallback(&mut backend, config)?,
            SessionStatus::Active => {}
        }

        debug!(
            session_id = backend.id().unwrap_or_default(),
            "Session store opened"
        );

        Ok(Self {
            backend,
            clock: Arc::new(SystemClock),
        })
    }

    fn start_with_fallback(backend: &mut B, config: &StoreConfig) -> Result<()> {
        let (path, reason) = match backend.start() {
            Ok(()) => return Ok(()),
            Err(Error::StorageUnwritable { path, reason }) => (path, reason),
            Err(e) => return Err(e),
        };

        let fallback = config.effective_fallback_dir();
        warn!(
            path = %path.display(),
            fallback = %fallback.display(),
            reason = %reason,
            "Session storage not writable, switching to fallback directory"
        );

        if !fallback.is_dir() {
            fs::create_dir_all(&fallback).map_err(|e| {
                Error::Configuration(format!(
                    "cannot create session fallback directory {}: {e}",
                    fallback.display()
                ))
            })?;
        }
        backend.set_save_path(fallback);

        backend.start().map_err(|e| {
            Error::Configuration(format!("session storage unusable after fallback: {e}"))
        })
    }

    /// Replace the clock used for TTL checks.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Access the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current session identifier, empty when no session is started.
    pub fn id(&self) -> &str {
        self.backend.id().unwrap_or_default()
    }

    /// Backend lifecycle state.
    pub fn status(&self) -> SessionStatus {
        self.backend.status()
    }

    /// Check whether a live (present, unexpired) value exists for `key`.
    pub fn has(&mut self, key: &str) -> Result<bool> {
        if self.expire_if_due(key)? {
            return Ok(false);
        }
        Ok(self.backend.get(key).is_some())
    }

    /// Read the raw value for `key`.
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        if self.expire_if_due(key)? {
            return Ok(None);
        }
        Ok(self.backend.get(key).cloned())
    }

    /// Read and decode the value for `key`.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key` with no expiry.
    ///
    /// Any TTL previously attached to `key` is dropped.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend.insert(key, value)?;
        self.backend.remove(&shadow_key(key))?;
        trace!(key = %key, "Session key set");
        Ok(())
    }

    /// Store `value` under `key`, expiring `ttl` from now.
    pub fn set_with_ttl<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let at = expires_at(self.clock.now(), ttl);
        self.backend.insert(key, value)?;
        self.backend.insert(&shadow_key(key), Value::from(at))?;
        trace!(key = %key, expires_at = at, "Session key set with TTL");
        Ok(())
    }

    /// Remove `key` and its TTL shadow key, if present.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        self.backend.remove(key)?;
        self.backend.remove(&shadow_key(key))?;
        Ok(())
    }

    /// Snapshot of every stored key, including shadow keys and entries
    /// that have expired but not been touched yet.
    pub fn all(&self) -> Map<String, Value> {
        self.backend.entries().clone()
    }

    /// Give the session a fresh id, keeping its state.
    ///
    /// Keys memoized under the old id become stale siblings.
    pub fn regenerate_id(&mut self) -> Result<String> {
        let old = self.id().to_string();
        let id = self.backend.regenerate_id()?;
        debug!(old_session_id = %old, session_id = %id, "Session id regenerated");
        Ok(id)
    }

    /// Terminate the session entirely.
    pub fn destroy(&mut self) -> Result<()> {
        let id = self.id().to_string();
        self.backend.destroy()?;
        debug!(session_id = %id, "Session destroyed");
        Ok(())
    }

    /// Remove `key` and its shadow if the shadow says it has expired.
    fn expire_if_due(&mut self, key: &str) -> Result<bool> {
        let shadow = shadow_key(key);
        match Expiry::classify(self.backend.get(&shadow), self.clock.now()) {
            Expiry::Expired(at) => {
                debug!(key = %key, expires_at = at, "Session key expired, removing");
                self.backend.remove(key)?;
                self.backend.remove(&shadow)?;
                Ok(true)
            }
            Expiry::Malformed => {
                warn!(key = %key, "Ignoring malformed TTL shadow key");
                Ok(false)
            }
            Expiry::Unbounded | Expiry::Live(_) => Ok(false),
        }
    }
}
