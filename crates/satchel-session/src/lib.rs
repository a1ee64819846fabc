//! Session store facade with pluggable backends and lazy TTL.
//!
//! This crate provides a small key/value facade over a host session with:
//! - Lifecycle handling (start or attach, destroy, id, status)
//! - A storage fallback directory when the backend cannot write
//! - Optional per-key TTL through `<key>__duration` shadow keys, checked on read
//!
//! # Example
//!
//! ```rust,ignore
//! use satchel_session::{FileBackend, SessionStore, StoreConfig};
//!
//! let config = StoreConfig::new().with_fallback_dir("./tmp");
//! let mut store = SessionStore::open(FileBackend::new("/var/lib/app/sessions"), &config)?;
//!
//! store.set_with_ttl("otp", "493021", Duration::from_secs(300))?;
//! ```

mod backend;
mod config;
mod error;
mod file;
mod store;
mod ttl;

pub use backend::{MemoryBackend, SessionBackend, SessionStatus, new_session_id};
pub use config::{DEFAULT_FALLBACK_DIR, StoreConfig};
pub use error::{Error, Result};
pub use file::FileBackend;
pub use store::SessionStore;
pub use ttl::{Clock, Expiry, ManualClock, SystemClock, TTL_SUFFIX, expires_at, shadow_key};
