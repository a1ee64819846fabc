//! Host session backends.
//!
//! This module defines the [`SessionBackend`] trait that decouples the
//! [`SessionStore`](crate::SessionStore) facade from where session state
//! actually lives, plus an in-process [`MemoryBackend`].

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Lifecycle state reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Sessions are structurally unavailable. Fatal.
    Disabled,
    /// No session has been started yet.
    #[default]
    None,
    /// A session is started and ready.
    Active,
}

/// Generate a fresh opaque session identifier.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Trait for host session backends.
///
/// A backend owns the key/value state of one session episode. The store
/// calls [`start`](SessionBackend::start) when the status is
/// [`SessionStatus::None`] and expects [`Error::StorageUnwritable`] when
/// the save directory cannot be used, so it can switch directories and retry.
pub trait SessionBackend {
    /// Current lifecycle state.
    fn status(&self) -> SessionStatus;

    /// Start (or attach to) a session.
    fn start(&mut self) -> Result<()>;

    /// Identifier of the current session, if one is started.
    fn id(&self) -> Option<&str>;

    /// Directory the backend persists to, if it persists at all.
    fn save_path(&self) -> Option<&Path>;

    /// Switch the directory used by the next [`start`](SessionBackend::start).
    fn set_save_path(&mut self, path: PathBuf);

    /// Read a raw value.
    fn get(&self, key: &str) -> Option<&Value>;

    /// Write a raw value.
    fn insert(&mut self, key: &str, value: Value) -> Result<()>;

    /// Remove a key, returning its previous value.
    fn remove(&mut self, key: &str) -> Result<Option<Value>>;

    /// Every stored key and value.
    fn entries(&self) -> &Map<String, Value>;

    /// Move the current state to a fresh session id, returning the new id.
    fn regenerate_id(&mut self) -> Result<String>;

    /// Terminate the session and drop its state.
    fn destroy(&mut self) -> Result<()>;
}

/// In-process backend. State lives as long as the value does.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    id: Option<String>,
    status: SessionStatus,
    save_path: Option<PathBuf>,
    data: Map<String, Value>,
}

impl MemoryBackend {
    /// Create a backend with no session started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that will start with a known session id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create a backend that reports sessions as disabled.
    pub fn disabled() -> Self {
        Self {
            status: SessionStatus::Disabled,
            ..Self::default()
        }
    }
}

impl SessionBackend for MemoryBackend {
    fn status(&self) -> SessionStatus {
        self.status
    }

    fn start(&mut self) -> Result<()> {
        if self.status == SessionStatus::Disabled {
            return Err(Error::Configuration("sessions are disabled".to_string()));
        }
        self.id.get_or_insert_with(new_session_id);
        self.status = SessionStatus::Active;
        Ok(())
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    fn set_save_path(&mut self, path: PathBuf) {
        self.save_path = Some(path);
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    fn insert(&mut self, key: &str, value: Value) -> Result<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.remove(key))
    }

    fn entries(&self) -> &Map<String, Value> {
        &self.data
    }

    fn regenerate_id(&mut self) -> Result<String> {
        if self.status != SessionStatus::Active {
            return Err(Error::Backend("no active session to regenerate".to_string()));
        }
        let id = new_session_id();
        self.id = Some(id.clone());
        Ok(id)
    }

    fn destroy(&mut self) -> Result<()> {
        self.data.clear();
        self.id = None;
        self.status = SessionStatus::None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_assigns_id() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.status(), SessionStatus::None);
        assert!(backend.id().is_none());

        backend.start().unwrap();
        assert_eq!(backend.status(), SessionStatus::Active);
        assert_eq!(backend.id().unwrap().len(), 32);
    }

    #[test]
    fn test_start_keeps_known_id() {
        let mut backend = MemoryBackend::with_id("abc123");
        backend.start().unwrap();
        assert_eq!(backend.id(), Some("abc123"));
    }

    #[test]
    fn test_disabled_cannot_start() {
        let mut backend = MemoryBackend::disabled();
        let err = backend.start().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_regenerate_keeps_data() {
        let mut backend = MemoryBackend::with_id("old");
        assert!(backend.regenerate_id().is_err());

        backend.start().unwrap();
        backend.insert("k", json!(1)).unwrap();
        let id = backend.regenerate_id().unwrap();

        assert_ne!(id, "old");
        assert_eq!(backend.id(), Some(id.as_str()));
        assert_eq!(backend.get("k"), Some(&json!(1)));
    }

    #[test]
    fn test_destroy_clears_state() {
        let mut backend = MemoryBackend::with_id("abc123");
        backend.start().unwrap();
        backend.insert("k", json!(1)).unwrap();

        backend.destroy().unwrap();
        assert!(backend.entries().is_empty());
        assert!(backend.id().is_none());
        assert_eq!(backend.status(), SessionStatus::None);
    }
}
