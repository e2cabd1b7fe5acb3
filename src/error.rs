//! Error types for the town cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the town cache.
///
/// Only `InvalidConfig` ever reaches a caller. Loader errors are produced
/// internally so they can be logged, then converted into a cache miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid construction parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The registered loader returned an error
    #[error("Loader failed for {key}: {source}")]
    Loader {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The registered loader did not finish in time
    #[error("Loader timed out for {key} after {}ms", .timeout.as_millis())]
    LoadTimeout { key: String, timeout: Duration },
}

// == Result Type Alias ==
/// Convenience Result type for the town cache.
pub type Result<T> = std::result::Result<T, CacheError>;
