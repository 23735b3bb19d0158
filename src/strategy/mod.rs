//! Cache Strategy Module
//!
//! "Get or compute" policies layered over any [`Cache`]:
//! - [`ReadThrough`] - populate synchronously on a miss
//! - [`WriteThrough`] - populate synchronously with every produced value
//! - [`WriteAround`] - populate out of the caller's critical path
//!
//! The strategy is picked per key class when it is constructed. Each holds
//! an `Arc` to the cache it fronts, so one cache can serve several strategies.

mod read_through;
mod write_around;
mod write_through;

pub use read_through::ReadThrough;
pub use write_around::WriteAround;
pub use write_through::WriteThrough;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::Cache;
use crate::config::validate_ttl;
use crate::error::CacheError;

/// Common contract of the caching policies.
///
/// `getter` produces the authoritative value. Its error is returned
/// unchanged and nothing is cached. Cache-side failures after the getter
/// succeeded are logged and never change the returned value. Argument
/// errors (empty key, zero TTL) reach the caller through `E: From<CacheError>`
/// before the getter runs.
#[async_trait]
pub trait CacheStrategy<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        getter: F,
        ttl: Option<Duration>,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: From<CacheError> + Send;

    /// Drops the cached value for `key`.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

fn check_ttl(ttl: Option<Duration>) -> Result<(), CacheError> {
    ttl.map_or(Ok(()), validate_ttl)
}

/// Synchronous best-effort write shared by the synchronous policies.
async fn populate<V, C>(cache: &C, key: &str, value: V, ttl: Option<Duration>)
where
    C: Cache<V> + ?Sized,
{
    if let Err(e) = cache.set(key, value, ttl).await {
        warn!(key = %key, error = %e, "cache population failed");
    }
}
