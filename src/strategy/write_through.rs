use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{check_ttl, populate, CacheStrategy};
use crate::cache::Cache;
use crate::config::validate_key;
use crate::error::CacheError;

/// Updates the cache in the same operation that produces the value.
///
/// For keys that are re-read right after being written: when a call
/// returns, the cache already holds the value it returned.
pub struct WriteThrough<C: ?Sized> {
    cache: Arc<C>,
}

impl<C: ?Sized> WriteThrough<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Runs `producer` (the write to the source of truth) unconditionally and
    /// stores its result before returning it.
    pub async fn write<V, F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
    ) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        C: Cache<V>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        validate_key(key)?;
        check_ttl(ttl)?;

        let value = producer().await?;
        populate(&*self.cache, key, value.clone(), ttl).await;
        debug!(key = %key, "write-through stored produced value");
        Ok(value)
    }
}

impl<C: ?Sized> Clone for WriteThrough<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[async_trait]
impl<V, C> CacheStrategy<V> for WriteThrough<C>
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
        populate(&*self.cache, key, value.clone(), ttl).await;
        Ok(value)
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.cache.delete(key).await
    }
}
