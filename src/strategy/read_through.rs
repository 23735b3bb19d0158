use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{check_ttl, populate, CacheStrategy};
use crate::cache::Cache;
use crate::error::CacheError;

/// Populates the cache before returning a freshly computed value.
///
/// Suited to read-heavy keys: once the first call returns, later calls are
/// served from the cache until the TTL runs out.
pub struct ReadThrough<C: ?Sized> {
    cache: Arc<C>,
}

impl<C: ?Sized> ReadThrough<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }
}

impl<C: ?Sized> Clone for ReadThrough<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[async_trait]
impl<V, C> CacheStrategy<V> for ReadThrough<C>
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
            debug!(key = %key, "read-through hit");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::{local_cache, LoadError, Source};

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = local_cache();
        let strategy = ReadThrough::new(cache.clone());
        let source = Source::default();

        let first = strategy
            .get_or_set("user:1", || source.load("Ann"), None)
            .await
            .unwrap();
        let second = strategy
            .get_or_set("user:1", || source.load("Bob"), None)
            .await
            .unwrap();

        assert_eq!(first, "Ann");
        assert_eq!(second, "Ann");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_getter_error_propagates_and_is_not_cached() {
        let cache = local_cache();
        let strategy = ReadThrough::new(cache.clone());
        let source = Source::default();

        let result = strategy.get_or_set("user:1", || source.fail(), None).await;

        match result {
            Err(LoadError::Database(msg)) => assert_eq!(msg, "connection reset"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(cache.get("user:1").unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_ttl_rejected_before_getter_runs() {
        let strategy = ReadThrough::new(local_cache());
        let source = Source::default();

        let result = strategy
            .get_or_set("user:1", || source.load("Ann"), Some(Duration::ZERO))
            .await;

        assert!(matches!(
            result,
            Err(LoadError::Cache(CacheError::InvalidArgument(_)))
        ));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache = local_cache();
        let strategy = ReadThrough::new(cache.clone());
        let source = Source::default();

        strategy
            .get_or_set("k", || source.load("v1"), None)
            .await
            .unwrap();
        CacheStrategy::<String>::invalidate(&strategy, "k").await.unwrap();
        let value = strategy
            .get_or_set("k", || source.load("v2"), None)
            .await
            .unwrap();

        assert_eq!(value, "v2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let cache: Arc<dyn Cache<String>> = local_cache();
        let strategy = ReadThrough::new(cache);
        let source = Source::default();

        for _ in 0..3 {
            let value: Result<String, LoadError> =
                strategy.get_or_set("k", || source.load("v"), None).await;
            assert_eq!(value.unwrap(), "v");
        }
        assert_eq!(source.calls(), 1);
    }
}
