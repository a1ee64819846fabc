//! Session storage with per-session memoization.
//!
//! Wires a [`SatchelConfig`] into a file-backed [`SessionStore`] and hands
//! out [`MemoizedKeyCache`]s that share the configured [`ComputePolicy`].
//!
//! # Example
//!
//! ```rust,ignore
//! use satchel::{GetOrOptions, Satchel};
//!
//! let mut satchel = Satchel::discover(None, cookie_session_id.as_deref())?;
//! let plan: Option<Plan> = satchel
//!     .cache("billing:plan")
//!     .get_or(GetOrOptions::default(), || lookup_plan(account))?;
//! ```

mod error;

use std::path::Path;

use tracing::{debug, warn};

pub use error::{Error, Result};
pub use satchel_config::{
    ConfigError, LoadedConfig, SatchelConfig, SessionSection, load_config, load_config_file,
};
pub use satchel_memo::{
    CacheKeyPolicy, ComputePolicy, GetOrOptions, MemoizedKeyCache, is_empty_value,
};
pub use satchel_session::{
    Clock, FileBackend, ManualClock, MemoryBackend, SessionBackend, SessionStatus, SessionStore,
    StoreConfig, SystemClock,
};

/// Store options derived from the `[session]` section.
pub fn store_config(section: &SessionSection) -> StoreConfig {
    StoreConfig {
        fallback_dir: section.effective_fallback_dir(),
    }
}

/// Compute policy derived from the `[session]` section.
pub fn compute_policy(section: &SessionSection) -> ComputePolicy {
    ComputePolicy {
        force_compute: section.force_compute_enabled(),
    }
}

/// An open session plus the compute policy its caches share.
#[derive(Debug)]
pub struct Satchel<B: SessionBackend = FileBackend> {
    store: SessionStore<B>,
    policy: ComputePolicy,
}

impl Satchel<FileBackend> {
    /// Open a file-backed session, resuming `session_id` when given.
    pub fn open(config: &SatchelConfig, session_id: Option<&str>) -> Result<Self> {
        let save_dir = config.session.effective_save_dir();
        let backend = match session_id {
            Some(id) => FileBackend::resume(&save_dir, id),
            None => FileBackend::new(&save_dir),
        };
        Self::with_backend(backend, config)
    }

    /// Discover configuration from the usual locations and open a session.
    pub fn discover(project_dir: Option<&Path>, session_id: Option<&str>) -> Result<Self> {
        let loaded = load_config(project_dir)?;
        for warning in &loaded.warnings {
            warn!("{}", warning);
        }
        debug!(sources = ?loaded.loaded_from(), "Configuration loaded");
        Self::open(&loaded.config, session_id)
    }
}

impl<B: SessionBackend> Satchel<B> {
    /// Open a session on an explicit backend.
    pub fn with_backend(backend: B, config: &SatchelConfig) -> Result<Self> {
        let store = SessionStore::open(backend, &store_config(&config.session))?;
        let policy = compute_policy(&config.session);
        if policy.force_compute {
            debug!("Forced computation enabled for all memoized keys");
        }
        Ok(Self { store, policy })
    }

    /// Replace the compute policy.
    pub fn with_policy(mut self, policy: ComputePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the clock used for TTL checks.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.store = self.store.with_clock(clock);
        self
    }

    /// Current session id.
    pub fn id(&self) -> &str {
        self.store.id()
    }

    /// The compute policy handed to caches.
    pub fn policy(&self) -> ComputePolicy {
        self.policy
    }

    /// Direct access to the session store.
    pub fn store(&mut self) -> &mut SessionStore<B> {
        &mut self.store
    }

    /// A memoized cache for `prefix` over this session.
    pub fn cache(&mut self, prefix: impl Into<String>) -> MemoizedKeyCache<'_, B> {
        MemoizedKeyCache::new(&mut self.store)
            .with_prefix(prefix)
            .with_policy(self.policy)
    }

    /// Give up the facade and keep the store.
    pub fn into_store(self) -> SessionStore<B> {
        self.store
    }
}
