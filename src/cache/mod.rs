//! Cache Module
//!
//! Versioned, TTL-bounded LRU content cache keyed by town and service.

use std::sync::{Mutex, MutexGuard, PoisonError};

mod entry;
mod flight;
mod handle;
mod key;
mod loader;
mod lru;
mod stats;
mod store;
mod version;


// Re-export public types
pub use entry::{CacheEntry, EntryView, Payload};
pub use handle::TownCache;
pub use key::{CacheKey, KEY_SEPARATOR};
pub use loader::{loader_fn, ContentLoader, FnLoader};
pub use lru::LruTracker;
pub use stats::{CacheStats, StatsCounter};
pub use store::{CacheStore, VersionStamp};
pub use version::VersionTable;

/// Locks a table mutex. Tables stay consistent between statements, so a
/// panic elsewhere never leaves them half-written and poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
