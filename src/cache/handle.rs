//! Town Cache Handle
//!
//! Thread-safe, cloneable handle around a [`CacheStore`] with loader
//! integration, single-flight loading and loader timeouts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::flight::{Flight, FlightTable};
use crate::cache::store::CacheStore;
use crate::cache::{lock, CacheKey, CacheStats, ContentLoader, EntryView, Payload};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_reaper;

// == Town Cache ==
/// Shared handle to a town content cache.
///
/// Cloning is cheap and every clone sees the same entries. The table lock is
/// never held across an `.await`, so a slow loader only delays callers of
/// its own key.
#[derive(Clone)]
pub struct TownCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Mutex<CacheStore>,
    loader: RwLock<Option<Arc<dyn ContentLoader>>>,
    flights: FlightTable,
    load_timeout: Option<Duration>,
    coalesce_loads: bool,
    reap_interval: Option<Duration>,
}

impl TownCache {
    // == Constructors ==
    /// Creates a cache with the given capacity and default TTL and default
    /// loader settings.
    pub fn new(max_size: usize, default_ttl: Duration) -> Result<Self> {
        let config = CacheConfig::new()
            .with_max_size(max_size)
            .with_default_ttl(default_ttl);
        Self::from_config(&config)
    }

    /// Creates a cache from configuration.
    ///
    /// # Errors
    /// `CacheError::InvalidConfig` if any configured value is out of range.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let store = CacheStore::from_config(config)?;

        Ok(Self {
            inner: Arc::new(Inner {
                store: Mutex::new(store),
                loader: RwLock::new(None),
                flights: FlightTable::new(),
                load_timeout: config.load_timeout,
                coalesce_loads: config.coalesce_loads,
                reap_interval: config.reap_interval,
            }),
        })
    }

    // == Loader Registration ==
    /// Registers the loader used on misses, replacing any previous one.
    pub fn set_loader<L>(&self, loader: L)
    where
        L: ContentLoader + 'static,
    {
        self.set_shared_loader(Arc::new(loader));
    }

    /// Registers an already shared loader, replacing any previous one.
    pub fn set_shared_loader(&self, loader: Arc<dyn ContentLoader>) {
        *self.loader_slot() = Some(loader);
        debug!("Content loader registered");
    }

    /// Removes the registered loader.
    pub fn clear_loader(&self) {
        *self.loader_slot() = None;
    }

    pub fn has_loader(&self) -> bool {
        self.loader().is_some()
    }

    // == Get Or Load ==
    /// Returns cached content, filling a miss from the registered loader.
    ///
    /// Loader errors and timeouts are logged and reported as `None`; the next
    /// call retries. Dropping the returned future cancels its load.
    pub async fn get_or_load(&self, town: &str, service: &str) -> Option<Payload> {
        self.fetch(town, service, self.inner.load_timeout).await
    }

    /// Like [`TownCache::get_or_load`], bounding the loader by `timeout`
    /// instead of the configured limit.
    pub async fn get_or_load_with_timeout(
        &self,
        town: &str,
        service: &str,
        timeout: Duration,
    ) -> Option<Payload> {
        self.fetch(town, service, Some(timeout)).await
    }

    // == Set ==
    /// Stores content, evicting the least recently used key if a new key
    /// would exceed capacity.
    pub fn set(&self, town: &str, service: &str, payload: Payload, ttl: Option<Duration>) {
        self.store().set(CacheKey::new(town, service), payload, ttl);
    }

    // == Invalidation ==
    /// Invalidates one service of a town, or the whole town when `service`
    /// is None. Returns the number of entries removed.
    pub fn invalidate(&self, town: &str, service: Option<&str>) -> usize {
        self.store().invalidate(town, service)
    }

    /// Clears every entry and version. Returns the number of entries removed.
    pub fn invalidate_all(&self) -> usize {
        self.store().invalidate_all()
    }

    // == Introspection ==
    /// True if a valid entry exists. Read-only.
    pub fn has(&self, town: &str, service: &str) -> bool {
        self.store().has(&CacheKey::new(town, service))
    }

    pub fn get_stats(&self) -> CacheStats {
        self.store().stats()
    }

    /// Valid entries ordered by key. Read-only.
    pub fn entries(&self) -> Vec<EntryView> {
        self.store().entries()
    }

    /// Removes expired and stale entries. Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        self.store().purge_stale()
    }

    /// Entries currently held, including ones not yet reaped.
    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    /// Loads currently in progress under single-flight.
    pub fn in_flight_loads(&self) -> usize {
        self.inner.flights.len()
    }

    /// Starts the background reaper if `reap_interval` was configured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_configured_reaper(&self) -> Option<JoinHandle<()>> {
        self.inner
            .reap_interval
            .map(|interval| spawn_reaper(self.clone(), interval))
    }

    async fn fetch(&self, town: &str, service: &str, timeout: Option<Duration>) -> Option<Payload> {
        let key = CacheKey::new(town, service);

        let cached = self.store().lookup(&key);
        if cached.is_some() {
            return cached;
        }

        let loader = self.loader()?;

        if !self.inner.coalesce_loads {
            return self
                .load_and_store(loader.as_ref(), &key, town, service, timeout)
                .await;
        }

        let flight = self.inner.flights.join(&key, || self.store().peek(&key));
        match flight {
            Flight::Ready(data) => Some(data),
            Flight::Follower(mut rx) => {
                debug!("Waiting on in-flight load for {}", key);
                match timeout {
                    Some(limit) => match tokio::time::timeout(limit, rx.recv()).await {
                        Ok(received) => received.ok().flatten(),
                        Err(_) => {
                            let err = CacheError::LoadTimeout {
                                key: key.to_string(),
                                timeout: limit,
                            };
                            warn!("{} waiting on in-flight load; treating as a miss", err);
                            None
                        }
                    },
                    None => rx.recv().await.ok().flatten(),
                }
            }
            Flight::Leader(guard) => {
                let outcome = self
                    .load_and_store(loader.as_ref(), &key, town, service, timeout)
                    .await;
                guard.complete(outcome.clone());
                outcome
            }
        }
    }

    async fn load_and_store(
        &self,
        loader: &dyn ContentLoader,
        key: &CacheKey,
        town: &str,
        service: &str,
        timeout: Option<Duration>,
    ) -> Option<Payload> {
        let stamp = self.store().stamp(key);

        match run_loader(loader, key, town, service, timeout).await {
            Ok(Some(data)) => {
                self.store().insert_loaded(key.clone(), data.clone(), stamp);
                Some(data)
            }
            Ok(None) => {
                debug!("Loader has no content for {}", key);
                None
            }
            Err(err) => {
                warn!("{}; treating as a miss", err);
                None
            }
        }
    }

    fn store(&self) -> MutexGuard<'_, CacheStore> {
        lock(&self.inner.store)
    }

    fn loader(&self) -> Option<Arc<dyn ContentLoader>> {
        self.inner
            .loader
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn loader_slot(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<dyn ContentLoader>>> {
        self.inner
            .loader
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TownCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TownCache")
            .field("stats", &self.get_stats())
            .field("has_loader", &self.has_loader())
            .field("coalesce_loads", &self.inner.coalesce_loads)
            .finish()
    }
}

async fn run_loader(
    loader: &dyn ContentLoader,
    key: &CacheKey,
    town: &str,
    service: &str,
    timeout: Option<Duration>,
) -> Result<Option<Payload>> {
    let load = loader.load(town, service);

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, load)
            .await
            .map_err(|_| CacheError::LoadTimeout {
                key: key.to_string(),
                timeout: limit,
            })?,
        None => load.await,
    };

    result.map_err(|source| CacheError::Loader {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::loader_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> TownCache {
        TownCache::new(100, Duration::from_secs(300)).unwrap()
    }

    #[tokio::test]
    async fn test_get_without_loader() {
        let cache = cache();

        assert!(!cache.has_loader());
        assert_eq!(cache.get_or_load("boston", "welcome").await, None);
        assert_eq!(cache.get_stats().misses, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = cache();
        let other = cache.clone();

        cache.set("Boston", "Welcome", Payload::new("hi"), None);

        assert!(other.has("boston", "welcome"));
        assert_eq!(other.get_or_load("BOSTON", "welcome").await, Some(Payload::new("hi")));
    }

    #[tokio::test]
    async fn test_last_registered_loader_wins() {
        let cache = cache();
        cache.set_loader(loader_fn(|_, _| async { Ok(Some(Payload::new("first"))) }));
        cache.set_loader(loader_fn(|_, _| async { Ok(Some(Payload::new("second"))) }));

        let data = cache.get_or_load("boston", "welcome").await;
        assert_eq!(data, Some(Payload::new("second")));

        cache.clear_loader();
        assert!(!cache.has_loader());
    }

    #[tokio::test]
    async fn test_loader_none_is_not_cached() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cache.set_loader(loader_fn(move |_, _| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        }));

        assert_eq!(cache.get_or_load("boston", "welcome").await, None);
        assert_eq!(cache.get_or_load("boston", "welcome").await, None);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight_loads(), 0);
    }

    #[tokio::test]
    async fn test_spawn_configured_reaper_requires_interval() {
        let cache = cache();
        assert!(cache.spawn_configured_reaper().is_none());

        let config = CacheConfig::new().with_reap_interval(Some(Duration::from_secs(1)));
        let cache = TownCache::from_config(&config).unwrap();
        let handle = cache.spawn_configured_reaper().unwrap();
        handle.abort();
    }

    #[test]
    fn test_debug_output() {
        let cache = cache();
        let rendered = format!("{:?}", cache);
        assert!(rendered.contains("TownCache"));
        assert!(rendered.contains("has_loader: false"));
    }
}
