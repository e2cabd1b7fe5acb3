//! Content Loader Module
//!
//! The seam through which the surrounding application fills cache misses.

use std::future::Future;

use async_trait::async_trait;

use crate::cache::Payload;

// == Content Loader ==
/// Source of content for cache misses.
///
/// Called with the caller's original (unnormalized) town and service.
/// `Ok(None)` means there is no content for that pair. Errors are logged by
/// the cache and turned into a miss, so a later lookup retries the load.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self, town: &str, service: &str) -> anyhow::Result<Option<Payload>>;
}

// == Fn Loader ==
/// Adapts an async closure into a [`ContentLoader`].
pub struct FnLoader<F> {
    f: F,
}

/// Wraps `f` as a loader.
///
/// ```ignore
/// cache.set_loader(loader_fn(|town, service| async move {
///     Ok(Some(Payload::new(format!("Welcome to {town} ({service})"))))
/// }));
/// ```
pub fn loader_fn<F, Fut>(f: F) -> FnLoader<F>
where
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Payload>>> + Send + 'static,
{
    FnLoader { f }
}

#[async_trait]
impl<F, Fut> ContentLoader for FnLoader<F>
where
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Payload>>> + Send + 'static,
{
    async fn load(&self, town: &str, service: &str) -> anyhow::Result<Option<Payload>> {
        (self.f)(town.to_string(), service.to_string()).await
    }
}
