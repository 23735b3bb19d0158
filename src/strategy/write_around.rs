use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{check_ttl, CacheStrategy};
use crate::cache::Cache;
use crate::config::validate_key;
use crate::error::CacheError;

/// Keeps cache writes off the caller's critical path.
///
/// For write-heavy keys: the produced value is handed to a detached tokio
/// task that stores it, and the caller returns without waiting. A failing
/// background write is logged and otherwise ignored.
pub struct WriteAround<C: ?Sized> {
    cache: Arc<C>,
}

impl<C: ?Sized> WriteAround<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Runs `producer` without consulting the cache and schedules the
    /// background store of its result.
    ///
    /// Any cached value for `key` is dropped before the producer runs, so a
    /// background store that fails leaves a miss, never the pre-write value.
    pub async fn write<V, F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
    ) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        C: Cache<V> + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        validate_key(key)?;
        check_ttl(ttl)?;

        self.cache.delete(key).await?;
        let value = producer().await?;
        self.populate_in_background(key, value.clone(), ttl);
        Ok(value)
    }

    fn populate_in_background<V>(&self, key: &str, value: V, ttl: Option<Duration>)
    where
        V: Send + 'static,
        C: Cache<V> + 'static,
    {
        let cache = Arc::clone(&self.cache);
        let key = key.to_string();

        tokio::spawn(async move {
            match cache.set(&key, value, ttl).await {
                Ok(()) => debug!(key = %key, "write-around background store done"),
                Err(e) => warn!(key = %key, error = %e, "write-around background store failed"),
            }
        });
    }
}

impl<C: ?Sized> Clone for WriteAround<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[async_trait]
impl<V, C> CacheStrategy<V> for WriteAround<C>
where
    V: Clone + Send + Sync + 'static,
    C: Cache<V> + ?Sized + 'static,
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
        E: From<CacheError> + Send,
    {
        check_ttl(ttl)?;

        if let Some(cached) = self.cache.get(key).await? {
            return Ok(cached);
        }

        let value = getter().await?;
        // Never awaited by the caller
        self.populate_in_background(key, value.clone(), ttl);
        Ok(value)
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.cache.delete(key).await
    }
}
