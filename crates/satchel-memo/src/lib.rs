//! Session-scoped memoization.
//!
//! A [`MemoizedKeyCache`] stores the result of a computation under
//! `<prefix>:<session-id>` in a [`SessionStore`](satchel_session::SessionStore):
//! - The computation runs at most once per session episode
//! - Keys left behind by older session ids for the same prefix are purged
//! - Recomputation can be forced per call ([`GetOrOptions`]) or globally
//!   ([`ComputePolicy`])
//! - Empty results are only stored when asked to
//!
//! # Example
//!
//! ```rust,ignore
//! use satchel_memo::{GetOrOptions, MemoizedKeyCache};
//!
//! let plan = MemoizedKeyCache::new(&mut store)
//!     .with_prefix("billing:plan")
//!     .get_or(GetOrOptions::new().with_allow_nulls(true), || lookup_plan(account))?;
//! ```

mod cache;
mod empty;
mod error;
mod options;
mod policy;

pub use cache::MemoizedKeyCache;
pub use empty::is_empty_value;
pub use error::{Error, Result};
pub use options::GetOrOptions;
pub use policy::{COMPUTED_MARKER_SUFFIX, CacheKeyPolicy, ComputePolicy};
