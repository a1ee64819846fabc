//! File-backed sessions.
//!
//! Each session is one JSON document in the save directory:
//!
//! ```text
//! <save_path>/
//! ├── sess_3f2b9c...json
//! └── sess_a81d04...json
//! ```
//!
//! Every mutation rewrites the document, so a later request that resumes the
//! same session id sees the state left by the previous one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::backend::{SessionBackend, SessionStatus, new_session_id};
use crate::error::{Error, Result};

/// Backend persisting each session as a JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    save_path: PathBuf,
    id: Option<String>,
    status: SessionStatus,
    data: Map<String, Value>,
}

impl FileBackend {
    /// Create a backend that starts a brand new session in `save_path`.
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
            id: None,
            status: SessionStatus::None,
            data: Map::new(),
        }
    }

    /// Create a backend that resumes session `id` from `save_path`.
    ///
    /// An id with no file on disk starts empty under that id.
    pub fn resume(save_path: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(save_path)
        }
    }

    /// Path of the current session's document.
    pub fn session_file(&self) -> Option<PathBuf> {
        self.id
            .as_deref()
            .map(|id| self.save_path.join(format!("sess_{id}.json")))
    }

    /// Session ids only use `[A-Za-z0-9_-]` so they cannot escape the save directory.
    pub fn is_valid_session_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn flush(&self) -> Result<()> {
        let Some(file) = self.session_file() else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(&self.data)?;
        fs::write(&file, bytes)?;
        trace!(path = %file.display(), keys = self.data.len(), "Session flushed");
        Ok(())
    }
}

impl SessionBackend for FileBackend {
    fn status(&self) -> SessionStatus {
        self.status
    }

    fn start(&mut self) -> Result<()> {
        if !self.save_path.is_dir() {
            return Err(Error::StorageUnwritable {
                path: self.save_path.clone(),
                reason: "directory does not exist".to_string(),
            });
        }

        let id = self.id.get_or_insert_with(new_session_id).clone();
        if !Self::is_valid_session_id(&id) {
            self.id = None;
            return Err(Error::Backend(format!("invalid session id: {id:?}")));
        }

        let file = self.save_path.join(format!("sess_{id}.json"));
        self.data = match fs::read(&file) {
            Ok(bytes) if bytes.is_empty() => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        // Writing up front surfaces an unwritable directory at start time.
        let bytes = serde_json::to_vec(&self.data)?;
        fs::write(&file, bytes).map_err(|e| Error::StorageUnwritable {
            path: self.save_path.clone(),
            reason: e.to_string(),
        })?;

        self.status = SessionStatus::Active;
        debug!(
            session_id = %id,
            path = %file.display(),
            keys = self.data.len(),
            "File session started"
        );
        Ok(())
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn save_path(&self) -> Option<&Path> {
        Some(&self.save_path)
    }

    fn set_save_path(&mut self, path: PathBuf) {
        self.save_path = path;
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    fn insert(&mut self, key: &str, value: Value) -> Result<()> {
        self.data.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        let previous = self.data.remove(key);
        if previous.is_some() {
            self.flush()?;
        }
        Ok(previous)
    }

    fn entries(&self) -> &Map<String, Value> {
        &self.data
    }

    fn regenerate_id(&mut self) -> Result<String> {
        if self.status != SessionStatus::Active {
            return Err(Error::Backend("no active session to regenerate".to_string()));
        }
        let old = self.session_file();
        let id = new_session_id();
        self.id = Some(id.clone());
        self.flush()?;
        if let Some(old) = old {
            match fs::remove_file(&old) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(session_id = %id, "Session id regenerated");
        Ok(id)
    }

    fn destroy(&mut self) -> Result<()> {
        if let Some(file) = self.session_file() {
            match fs::remove_file(&file) {
                Ok(()) => debug!(path = %file.display(), "Session file removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.data.clear();
        self.id = None;
        self.status = SessionStatus::None;
        Ok(())
    }
}
