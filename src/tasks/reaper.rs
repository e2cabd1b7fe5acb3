//! Expiry Reaper Task
//!
//! Optional background task that periodically removes expired and stale
//! cache entries. Lookups treat such entries as misses whether or not the
//! reaper has run; it only bounds memory held by entries nobody reads.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TownCache;

/// Spawns a background task that periodically purges expired and stale entries.
///
/// # Arguments
/// * `cache` - Handle to the cache to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = TownCache::new(100, Duration::from_secs(1800))?;
/// let reaper = spawn_reaper(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// reaper.abort();
/// ```
pub fn spawn_reaper(cache: TownCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache reaper with interval of {}ms", interval.as_millis());

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_stale();
            if removed > 0 {
                info!("Cache reaper: removed {} expired or stale entries", removed);
            } else {
                debug!("Cache reaper: nothing to remove");
            }
        }
    })
}
