//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default maximum number of distinct keys.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default TTL applied to entries without a per-call override.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Default upper bound on a single loader call.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of distinct keys the cache retains
    pub max_size: usize,
    /// TTL for entries set without an explicit override
    pub default_ttl: Duration,
    /// Upper bound on each loader call, None = wait indefinitely
    pub load_timeout: Option<Duration>,
    /// Share one loader call between concurrent misses on the same key
    pub coalesce_loads: bool,
    /// Background reaper interval, None = lazy expiry only
    pub reap_interval: Option<Duration>,
}

impl CacheConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TOWN_CACHE_MAX_SIZE` - Maximum distinct keys (default: 100)
    /// - `TOWN_CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 1800000)
    /// - `TOWN_CACHE_LOAD_TIMEOUT_MS` - Loader timeout in milliseconds, 0 disables (default: 10000)
    /// - `TOWN_CACHE_COALESCE_LOADS` - Single-flight loader calls (default: true)
    /// - `TOWN_CACHE_REAP_INTERVAL_MS` - Background reaper interval, 0 disables (default: disabled)
    ///
    /// Unparseable values fall back to the defaults. Range checks happen in
    /// [`CacheConfig::validate`] when the cache is built.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size: env_parse("TOWN_CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            default_ttl: env_parse("TOWN_CACHE_DEFAULT_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_ttl),
            load_timeout: match env_parse::<u64>("TOWN_CACHE_LOAD_TIMEOUT_MS") {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => defaults.load_timeout,
            },
            coalesce_loads: env_parse("TOWN_CACHE_COALESCE_LOADS")
                .unwrap_or(defaults.coalesce_loads),
            reap_interval: env_parse::<u64>("TOWN_CACHE_REAP_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }

    /// Sets the maximum number of distinct keys.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the default entry TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets or disables the loader timeout.
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Enables or disables single-flight loading.
    pub fn with_coalesce_loads(mut self, enabled: bool) -> Self {
        self.coalesce_loads = enabled;
        self
    }

    /// Sets or disables the background reaper interval.
    pub fn with_reap_interval(mut self, interval: Option<Duration>) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Rejects values that would leave the cache unusable.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than 0".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be greater than 0".to_string(),
            ));
        }
        if self.load_timeout.is_some_and(|t| t.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "load_timeout must be greater than 0 when set".to_string(),
            ));
        }
        if self.reap_interval.is_some_and(|t| t.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "reap_interval must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL,
            load_timeout: Some(DEFAULT_LOAD_TIMEOUT),
            coalesce_loads: true,
            reap_interval: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
