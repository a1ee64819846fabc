//! Memoization of computations into session-scoped keys.

use std::time::Duration;

use satchel_session::{MemoryBackend, SessionBackend, SessionStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::empty::is_empty_value;
use crate::error::{Error, Result};
use crate::options::GetOrOptions;
use crate::policy::{CacheKeyPolicy, ComputePolicy};

/// Memoizes computations under `<prefix>:<session-id>` keys.
///
/// The cache borrows a [`SessionStore`] for as long as it is used, so the
/// store handle is always explicit at the call site:
///
/// ```rust,ignore
/// let profile: Option<Profile> = MemoizedKeyCache::new(&mut store)
///     .with_prefix("user:profile")
///     .get_or(GetOrOptions::default(), || load_profile(user_id))?;
/// ```
#[derive(Debug)]
pub struct MemoizedKeyCache<'s, B: SessionBackend = MemoryBackend> {
    store: &'s mut SessionStore<B>,
    keys: CacheKeyPolicy,
    policy: ComputePolicy,
}

impl<'s, B: SessionBackend> MemoizedKeyCache<'s, B> {
    /// Create a cache over `store` with no prefix and the default policy.
    pub fn new(store: &'s mut SessionStore<B>) -> Self {
        Self {
            store,
            keys: CacheKeyPolicy::new(),
            policy: ComputePolicy::default(),
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = self.keys.with_prefix(prefix);
        self
    }

    /// Replace the key policy.
    pub fn with_keys(mut self, keys: CacheKeyPolicy) -> Self {
        self.keys = keys;
        self
    }

    /// Set the global compute policy.
    pub fn with_policy(mut self, policy: ComputePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The configured prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.keys.prefix()
    }

    /// Composite key for the current session.
    pub fn key(&self) -> Result<String> {
        self.keys.key(self.store.id())
    }

    /// Computed marker key for this prefix.
    pub fn computed_marker_key(&self) -> Result<String> {
        self.keys.computed_marker()
    }

    /// Current session id.
    pub fn session_id(&self) -> &str {
        self.store.id()
    }

    /// Read the composite key without computing anything.
    pub fn session(&mut self) -> Result<Option<Value>> {
        let key = self.key()?;
        Ok(self.store.get(&key)?)
    }

    /// Read and decode the composite key without computing anything.
    pub fn session_as<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let key = self.key()?;
        Ok(self.store.get_as(&key)?)
    }

    /// Remove every key left for this prefix by other session ids.
    ///
    /// Returns the number of keys removed.
    pub fn invalidate_siblings(&mut self) -> Result<usize> {
        let key = self.key()?;
        let stale: Vec<String> = self
            .store
            .all()
            .into_iter()
            .map(|(candidate, _)| candidate)
            .filter(|candidate| self.keys.is_sibling(candidate, &key))
            .collect();

        for candidate in &stale {
            self.store.unset(candidate)?;
        }

        if !stale.is_empty() {
            debug!(
                prefix = self.keys.prefix().unwrap_or_default(),
                removed = stale.len(),
                "Invalidated stale sibling keys"
            );
        }
        Ok(stale.len())
    }

    /// Return the memoized value, computing and storing it on first use.
    ///
    /// See [`try_get_or`](Self::try_get_or) for the lookup order.
    pub fn get_or<T, F>(&mut self, options: GetOrOptions, compute: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.try_get_or(options, || Ok::<T, Error>(compute()))
    }

    /// Return the memoized value, computing it with a fallible function.
    ///
    /// Lookup order:
    /// 1. With `invalidate_siblings`, purge stale keys for the prefix.
    /// 2. Without a force flag, a stored value is returned as is.
    /// 3. Without a force flag, an existing computed marker means the
    ///    computation already ran this episode; whatever is stored (possibly
    ///    nothing) is returned.
    /// 4. Otherwise the computation runs. A non-empty result, or any result
    ///    with `allow_nulls`, is stored along with the marker and returned.
    ///    An empty result without `allow_nulls` is dropped: nothing is
    ///    stored, no marker is set and `Ok(None)` is returned, so the next
    ///    call computes again.
    ///
    /// Errors from `compute` propagate untouched and nothing is cached.
    pub fn try_get_or<T, E, F>(
        &mut self,
        options: GetOrOptions,
        compute: F,
    ) -> std::result::Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let key = self.key()?;
        let marker = self.keys.computed_marker()?;

        if options.invalidate_siblings {
            self.invalidate_siblings()?;
        }

        let options = if self.policy.force_compute {
            options.with_force_compute(true)
        } else {
            options
        };

        if !options.bypasses_cache() && self.has(&key)? {
            trace!(key = %key, "Memoized value hit");
            return Ok(self.read(&key)?);
        }

        if !options.bypasses_cache() && self.has(&marker)? {
            trace!(key = %key, "Already computed this session, skipping computation");
            return Ok(self.read(&key)?);
        }

        debug!(
            key = %key,
            force_compute = options.force_compute,
            force_refresh = options.force_refresh,
            "Computing memoized value"
        );
        let value = compute()?;
        let stored = serde_json::to_value(&value).map_err(Error::from)?;

        if is_empty_value(&stored) && !options.allow_nulls {
            debug!(key = %key, "Computed value is empty and nulls are not allowed, not stored");
            return Ok(None);
        }

        self.write(&key, &stored, options.ttl)?;
        self.write(&marker, &Value::Bool(true), options.ttl)?;
        Ok(Some(value))
    }

    /// Compute and store only if the composite key is absent.
    ///
    /// Returns the stored value either way.
    pub fn persist<T, F>(&mut self, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let key = self.key()?;
        if let Some(existing) = self.store.get(&key)? {
            return Ok(serde_json::from_value(existing)?);
        }
        let value = compute();
        self.store.set(&key, &value)?;
        Ok(value)
    }

    /// Read the composite key without computing. Same as [`session_as`](Self::session_as).
    pub fn obtain<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        self.session_as()
    }

    /// Always compute and store.
    pub fn overwrite<T, F>(&mut self, compute: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        let key = self.key()?;
        let value = compute();
        self.store.set(&key, &value)?;
        Ok(value)
    }

    /// Remove the composite key if `predicate` returns true.
    ///
    /// Returns whether the predicate fired.
    pub fn invalidate_if(&mut self, predicate: impl FnOnce() -> bool) -> Result<bool> {
        let key = self.key()?;
        if !predicate() {
            return Ok(false);
        }
        self.store.unset(&key)?;
        debug!(key = %key, "Memoized value invalidated");
        Ok(true)
    }

    fn has(&mut self, key: &str) -> Result<bool> {
        Ok(self.store.has(key)?)
    }

    fn read<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        Ok(self.store.get_as(key)?)
    }

    fn write(&mut self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
        match ttl {
            Some(ttl) => self.store.set_with_ttl(key, value, ttl)?,
            None => self.store.set(key, value)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_session::{ManualClock, StoreConfig};
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::Cell;

    fn open_store(id: &str) -> SessionStore {
        SessionStore::open(MemoryBackend::with_id(id), &StoreConfig::default()).unwrap()
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
    }

    #[test]
    fn test_key_is_prefix_and_session_id() {
        let mut store = open_store("abc123");
        let cache = MemoizedKeyCache::new(&mut store).with_prefix("user:profile");

        assert_eq!(cache.key().unwrap(), "user:profile:abc123");
        assert_eq!(cache.session_id(), "abc123");
        assert_eq!(
            cache.computed_marker_key().unwrap(),
            "user:profile:_was-computed"
        );
    }

    #[test]
    fn test_operations_without_prefix_fail() {
        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store);

        assert!(cache.key().unwrap_err().is_configuration());
        assert!(matches!(cache.session(), Err(Error::PrefixUnset)));
        assert!(matches!(
            cache.get_or(GetOrOptions::default(), || 1),
            Err(Error::PrefixUnset)
        ));
        assert!(matches!(cache.persist(|| 1), Err(Error::PrefixUnset)));
        assert!(matches!(cache.obtain::<u32>(), Err(Error::PrefixUnset)));
        assert!(matches!(cache.overwrite(|| 1), Err(Error::PrefixUnset)));
        assert!(matches!(cache.invalidate_if(|| true), Err(Error::PrefixUnset)));
    }

    #[test]
    fn test_profile_scenario() {
        let mut store = open_store("abc123");
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Profile {
                name: "Ann".to_string(),
            }
        };

        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("user:profile");
        let first = cache.get_or(GetOrOptions::default(), load).unwrap();
        let second = cache.get_or(GetOrOptions::default(), load).unwrap();

        let expected = Profile {
            name: "Ann".to_string(),
        };
        assert_eq!(first, Some(expected.clone()));
        assert_eq!(second, Some(expected));
        assert_eq!(calls.get(), 1);

        assert_eq!(
            store.get("user:profile:abc123").unwrap(),
            Some(json!({"name": "Ann"}))
        );
        assert_eq!(
            store.get("user:profile:_was-computed").unwrap(),
            Some(json!(true))
        );
    }

    #[test]
    fn test_sibling_invalidation() {
        let mut store = open_store("S2");
        store.set("P:S1", "old").unwrap();
        store.set("P:S2", "current").unwrap();
        store.set("P:_was-computed", &true).unwrap();
        store.set("other", &1).unwrap();

        let value: Option<String> = MemoizedKeyCache::new(&mut store)
            .with_prefix("P")
            .get_or(GetOrOptions::default(), || "fresh".to_string())
            .unwrap();

        assert_eq!(value.as_deref(), Some("current"));
        let all = store.all();
        assert!(!all.contains_key("P:S1"));
        assert!(all.contains_key("P:S2"));
        assert!(all.contains_key("P:_was-computed"));
        assert!(all.contains_key("other"));
    }

    #[test]
    fn test_sibling_invalidation_can_be_disabled() {
        let mut store = open_store("S2");
        store.set("P:S1", "old").unwrap();

        MemoizedKeyCache::new(&mut store)
            .with_prefix("P")
            .get_or(GetOrOptions::new().without_sibling_invalidation(), || 1)
            .unwrap();

        assert!(store.all().contains_key("P:S1"));
    }

    #[test]
    fn test_invalidate_siblings_counts_removed() {
        let mut store = open_store("S3");
        store.set("P:S1", &1).unwrap();
        store.set("P:S2", &2).unwrap();
        store.set("P:S3", &3).unwrap();

        let removed = MemoizedKeyCache::new(&mut store)
            .with_prefix("P")
            .invalidate_siblings()
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn test_force_compute_recomputes_and_overwrites() {
        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");
        cache.get_or(GetOrOptions::default(), || 1).unwrap();

        let value = cache
            .get_or(GetOrOptions::new().with_force_compute(true), || 2)
            .unwrap();
        assert_eq!(value, Some(2));
        assert_eq!(cache.obtain::<i32>().unwrap(), Some(2));
    }

    #[test]
    fn test_force_refresh_recomputes_and_overwrites() {
        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");
        cache.get_or(GetOrOptions::default(), || 1).unwrap();

        let value = cache
            .get_or(GetOrOptions::new().force_refresh_if(|| true), || 2)
            .unwrap();
        assert_eq!(value, Some(2));
        assert_eq!(cache.obtain::<i32>().unwrap(), Some(2));

        // Options do not carry over to the next call
        let value = cache.get_or(GetOrOptions::default(), || 3).unwrap();
        assert_eq!(value, Some(2));
    }

    #[test]
    fn test_global_policy_forces_compute() {
        let mut store = open_store("abc123");
        let calls = Cell::new(0);
        let mut cache = MemoizedKeyCache::new(&mut store)
            .with_prefix("P")
            .with_policy(ComputePolicy::forced());

        for _ in 0..3 {
            cache
                .get_or(GetOrOptions::default(), || {
                    calls.set(calls.get() + 1);
                    calls.get()
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 3);
        assert_eq!(cache.obtain::<i32>().unwrap(), Some(3));
    }

    #[test]
    fn test_empty_result_not_stored_without_allow_nulls() {
        let mut store = open_store("abc123");
        let calls = Cell::new(0);
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");

        for _ in 0..2 {
            let value = cache
                .get_or(GetOrOptions::default(), || {
                    calls.set(calls.get() + 1);
                    String::new()
                })
                .unwrap();
            assert_eq!(value, None);
        }

        // No marker was set, so every call computes again
        assert_eq!(calls.get(), 2);
        assert!(!store.has("P:abc123").unwrap());
        assert!(!store.has("P:_was-computed").unwrap());
    }

    #[test]
    fn test_empty_result_stored_with_allow_nulls() {
        let mut store = open_store("abc123");
        let calls = Cell::new(0);
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");
        let options = GetOrOptions::new().with_allow_nulls(true);

        let first = cache
            .get_or(options, || {
                calls.set(calls.get() + 1);
                Vec::<u32>::new()
            })
            .unwrap();
        let second = cache
            .get_or(options, || {
                calls.set(calls.get() + 1);
                vec![1]
            })
            .unwrap();

        assert_eq!(first, Some(vec![]));
        assert_eq!(second, Some(vec![]));
        assert_eq!(calls.get(), 1);
        assert!(store.has("P:abc123").unwrap());
        assert_eq!(store.get("P:_was-computed").unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_marker_short_circuits_missing_value() {
        let mut store = open_store("abc123");
        store.set("P:_was-computed", &true).unwrap();
        let calls = Cell::new(0);
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");

        let value = cache
            .get_or(GetOrOptions::default(), || {
                calls.set(calls.get() + 1);
                7
            })
            .unwrap();
        assert_eq!(value, None);
        assert_eq!(calls.get(), 0);

        let value = cache
            .get_or(GetOrOptions::new().with_force_compute(true), || {
                calls.set(calls.get() + 1);
                7
            })
            .unwrap();
        assert_eq!(value, Some(7));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_computation_error_is_not_cached() {
        #[derive(Debug)]
        enum AppError {
            Lookup(&'static str),
            Cache(Error),
        }

        impl From<Error> for AppError {
            fn from(e: Error) -> Self {
                AppError::Cache(e)
            }
        }

        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");

        let err = cache
            .try_get_or::<u32, _, _>(GetOrOptions::default(), || Err(AppError::Lookup("down")))
            .unwrap_err();
        assert!(matches!(err, AppError::Lookup("down")));
        assert!(!matches!(err, AppError::Cache(_)));
        assert_eq!(cache.session().unwrap(), None);

        let value = cache
            .try_get_or(GetOrOptions::default(), || Ok::<_, AppError>(5u32))
            .unwrap();
        assert_eq!(value, Some(5));
    }

    #[test]
    fn test_cache_error_reaches_caller_error_type() {
        #[derive(Debug)]
        struct AppError(Error);

        impl From<Error> for AppError {
            fn from(e: Error) -> Self {
                AppError(e)
            }
        }

        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store);
        let err = cache
            .try_get_or(GetOrOptions::default(), || Ok::<_, AppError>(1))
            .unwrap_err();
        assert!(matches!(err, AppError(Error::PrefixUnset)));
    }

    #[test]
    fn test_ttl_expires_value_and_marker() {
        let clock = ManualClock::new(0);
        let mut store = open_store("abc123").with_clock(clock.clone());
        let calls = Cell::new(0);
        let options = GetOrOptions::new().with_ttl(Duration::from_secs(60));
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");

        let compute = || {
            calls.set(calls.get() + 1);
            calls.get()
        };
        assert_eq!(cache.get_or(options, &compute).unwrap(), Some(1));
        assert_eq!(cache.get_or(options, &compute).unwrap(), Some(1));

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get_or(options, &compute).unwrap(), Some(2));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_persist_only_when_absent() {
        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");

        assert_eq!(cache.persist(|| "first".to_string()).unwrap(), "first");
        assert_eq!(cache.persist(|| "second".to_string()).unwrap(), "first");
        assert_eq!(cache.obtain::<String>().unwrap().as_deref(), Some("first"));

        // The simplified variants never touch the marker
        assert!(!store.has("P:_was-computed").unwrap());
    }

    #[test]
    fn test_overwrite_always_stores() {
        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");

        assert_eq!(cache.obtain::<u32>().unwrap(), None);
        cache.overwrite(|| 1u32).unwrap();
        cache.overwrite(|| 2u32).unwrap();
        assert_eq!(cache.obtain::<u32>().unwrap(), Some(2));
    }

    #[test]
    fn test_invalidate_if() {
        let mut store = open_store("abc123");
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");
        cache.overwrite(|| 1u32).unwrap();

        assert!(!cache.invalidate_if(|| false).unwrap());
        assert_eq!(cache.obtain::<u32>().unwrap(), Some(1));

        assert!(cache.invalidate_if(|| true).unwrap());
        assert_eq!(cache.obtain::<u32>().unwrap(), None);
    }

    #[test]
    fn test_session_reads_raw_value() {
        let mut store = open_store("abc123");
        store.set("P:abc123", &json!({"n": 1})).unwrap();
        let mut cache = MemoizedKeyCache::new(&mut store).with_prefix("P");

        assert_eq!(cache.session().unwrap(), Some(json!({"n": 1})));
    }
}
