//! Remote Cache Module
//!
//! Cache client over a shared key-value backend. Backend trouble of any kind
//! (unreachable, slow, garbage payload) turns into a miss on reads and a
//! no-op on writes; callers always fall back to the authoritative source.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{Cache, CacheStats, Codec, JsonCodec, KvBackend};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Tuning for remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteOptions {
    /// Upper bound on every single backend command
    pub op_timeout: Duration,
    /// COUNT hint per SCAN round in `clear_namespace`
    pub scan_batch_size: usize,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(2),
            scan_batch_size: 100,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    backend_errors: AtomicU64,
}

// == Remote Cache ==
/// Namespaced cache stored in an external key-value service.
pub struct RemoteCache<V, C = JsonCodec> {
    backend: Arc<dyn KvBackend>,
    codec: C,
    config: Arc<CacheConfig>,
    options: RemoteOptions,
    counters: Counters,
    _value: PhantomData<fn() -> V>,
}

impl<V> RemoteCache<V, JsonCodec>
where
    JsonCodec: Codec<V>,
{
    /// Creates a JSON-encoding cache over `backend`.
    pub fn new(backend: Arc<dyn KvBackend>, config: CacheConfig) -> Self {
        Self::with_codec(backend, config, JsonCodec)
    }
}

impl<V, C> RemoteCache<V, C>
where
    C: Codec<V>,
{
    /// Creates a cache with an explicit codec.
    pub fn with_codec(backend: Arc<dyn KvBackend>, config: CacheConfig, codec: C) -> Self {
        Self {
            backend,
            codec,
            config: Arc::new(config),
            options: RemoteOptions::default(),
            counters: Counters::default(),
            _value: PhantomData,
        }
    }

    pub fn with_options(mut self, options: RemoteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn options(&self) -> RemoteOptions {
        self.options
    }

    /// Runs one backend command under the per-call timeout.
    async fn bounded<T, F>(&self, op: &'static str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.options.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                op,
                key: key.to_string(),
            }),
        }
    }

    fn degrade(&self, op: &'static str, key: &str, err: &CacheError) {
        self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
        warn!(op, key = %key, error = %err, "remote cache operation failed; degrading");
    }

    fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Get ==
    /// Returns the cached value, or `None` on absence or any backend failure.
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        let full_key = self.config.qualify(key)?;

        let bytes = match self
            .bounded("GET", &full_key, self.backend.get(&full_key))
            .await
        {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %full_key, "remote cache miss");
                self.record_miss();
                return Ok(None);
            }
            Err(e) => {
                self.degrade("GET", &full_key, &e);
                self.record_miss();
                return Ok(None);
            }
        };

        match self.codec.decode(&bytes) {
            Ok(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Err(e) => {
                self.degrade("DECODE", &full_key, &e);
                self.record_miss();
                Ok(None)
            }
        }
    }

    // == Set ==
    /// Writes `value` with `SET EX`. The TTL is rounded up to whole seconds.
    ///
    /// Encoding and backend failures are logged and swallowed.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        let full_key = self.config.qualify(key)?;
        let ttl_secs = ttl_to_secs(self.config.resolve_ttl(ttl)?);

        let bytes = match self.codec.encode(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.degrade("ENCODE", &full_key, &e);
                return Ok(());
            }
        };

        if let Err(e) = self
            .bounded("SET", &full_key, self.backend.set_ex(&full_key, bytes, ttl_secs))
            .await
        {
            self.degrade("SET", &full_key, &e);
        }
        Ok(())
    }

    // == Delete ==
    /// Deletes the key. Failures are logged and swallowed.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let full_key = self.config.qualify(key)?;
        let keys = [full_key];

        if let Err(e) = self.bounded("DEL", &keys[0], self.backend.del(&keys)).await {
            self.degrade("DEL", &keys[0], &e);
        }
        Ok(())
    }

    // == Clear Namespace ==
    /// Deletes every key under this cache's namespace, one SCAN batch at a
    /// time. Returns how many keys were deleted before finishing or failing.
    pub async fn clear_namespace(&self) -> u64 {
        let pattern = self.config.namespace_pattern();
        let batch = self.options.scan_batch_size.max(1);
        let mut cursor = 0;
        let mut deleted = 0;

        loop {
            let (next, keys) = match self
                .bounded("SCAN", &pattern, self.backend.scan(cursor, &pattern, batch))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.degrade("SCAN", &pattern, &e);
                    break;
                }
            };

            if !keys.is_empty() {
                match self.bounded("DEL", &pattern, self.backend.del(&keys)).await {
                    Ok(n) => deleted += n,
                    Err(e) => {
                        self.degrade("DEL", &pattern, &e);
                        break;
                    }
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(namespace = %self.config.namespace(), deleted, "remote namespace cleared");
        deleted
    }

    /// Hit/miss/error counters. `total_entries` is not tracked remotely.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }
}

/// Largest `EX` value sent to the backend. Redis rejects expiries whose
/// millisecond deadline overflows `i64`; half that range leaves room for "now".
const MAX_EX_SECS: u64 = i64::MAX as u64 / 1000 / 2;

/// Whole seconds for `EX`, rounded up, at least 1 and at most `MAX_EX_SECS`.
fn ttl_to_secs(ttl: Duration) -> u64 {
    let secs = ttl
        .as_secs()
        .saturating_add(u64::from(ttl.subsec_nanos() > 0));
    secs.clamp(1, MAX_EX_SECS)
}

#[async_trait]
impl<V, C> Cache<V> for RemoteCache<V, C>
where
    V: Send + Sync + 'static,
    C: Codec<V> + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        RemoteCache::get(self, key).await
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        RemoteCache::set(self, key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        RemoteCache::delete(self, key).await
    }

    async fn clear(&self) -> Result<()> {
        self.clear_namespace().await;
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        RemoteCache::stats(self)
    }

    fn config(&self) -> &CacheConfig {
        RemoteCache::config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;

    fn remote(backend: &Arc<MemoryBackend>, namespace: &str) -> RemoteCache<String> {
        let config = CacheConfig::new(namespace, Duration::from_secs(60)).unwrap();
        RemoteCache::new(backend.clone(), config)
    }

    #[test]
    fn test_ttl_to_secs() {
        assert_eq!(ttl_to_secs(Duration::from_secs(60)), 60);
        assert_eq!(ttl_to_secs(Duration::from_millis(1_500)), 2);
        assert_eq!(ttl_to_secs(Duration::from_millis(1)), 1);
    }

    #[test]
    fn test_ttl_to_secs_clamps_huge_ttl() {
        assert_eq!(ttl_to_secs(Duration::MAX), MAX_EX_SECS);
        assert_eq!(ttl_to_secs(Duration::from_secs(u64::MAX)), MAX_EX_SECS);
        assert_eq!(ttl_to_secs(Duration::from_secs(MAX_EX_SECS)), MAX_EX_SECS);
    }

    #[tokio::test]
    async fn test_huge_ttl_is_stored() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = remote(&backend, "ns");

        cache
            .set("forever", "v".to_string(), Some(Duration::MAX))
            .await
            .unwrap();

        assert_eq!(cache.get("forever").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.stats().backend_errors, 0);
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = remote(&backend, "orders");

        cache.set("order:7", "shipped".to_string(), None).await.unwrap();
        assert_eq!(cache.get("order:7").await.unwrap(), Some("shipped".to_string()));
        assert!(backend.get("orders:order:7").await.unwrap().is_some());

        cache.delete("order:7").await.unwrap();
        assert_eq!(cache.get("order:7").await.unwrap(), None);

        // Deleting again is a no-op
        cache.delete("order:7").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.backend_errors, 0);
    }

    #[tokio::test]
    async fn test_key_prefix_is_part_of_stored_key() {
        let backend = Arc::new(MemoryBackend::new());
        let config = CacheConfig::new("orders", Duration::from_secs(60))
            .unwrap()
            .with_key_prefix("v2")
            .unwrap();
        let cache: RemoteCache<u32> = RemoteCache::new(backend.clone(), config);

        cache.set("order:7", 7, None).await.unwrap();
        assert!(backend.get("orders:v2:order:7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_a_miss() {
        let backend = Arc::new(MemoryBackend::new());
        let cache: RemoteCache<Vec<u32>> = RemoteCache::new(
            backend.clone(),
            CacheConfig::new("ns", Duration::from_secs(60)).unwrap(),
        );

        backend
            .set_ex("ns:broken", b"not json".to_vec(), 60)
            .await
            .unwrap();

        assert_eq!(cache.get("broken").await.unwrap(), None);
        assert_eq!(cache.stats().backend_errors, 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_still_surface() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = remote(&backend, "ns");

        assert!(matches!(
            cache.get("").await,
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(matches!(
            cache.set("k", "v".to_string(), Some(Duration::ZERO)).await,
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_namespace_only_touches_own_keys() {
        let backend = Arc::new(MemoryBackend::new());
        let orders = remote(&backend, "orders").with_options(RemoteOptions {
            scan_batch_size: 3,
            ..RemoteOptions::default()
        });
        let users = remote(&backend, "users");

        for i in 0..10 {
            orders.set(&format!("o{i}"), "x".into(), None).await.unwrap();
            users.set(&format!("u{i}"), "y".into(), None).await.unwrap();
        }

        assert_eq!(orders.clear_namespace().await, 10);
        assert_eq!(orders.get("o1").await.unwrap(), None);
        assert_eq!(users.get("u1").await.unwrap(), Some("y".to_string()));
        assert_eq!(backend.len(), 10);
    }

    #[tokio::test]
    async fn test_clear_namespace_spares_namespace_sharing_a_prefix() {
        let backend = Arc::new(MemoryBackend::new());
        let a = remote(&backend, "a");
        let ab = remote(&backend, "ab");

        a.set("x", "from-a".into(), None).await.unwrap();
        ab.set("x", "from-ab".into(), None).await.unwrap();
        ab.set("b:y", "nested".into(), None).await.unwrap();

        assert_eq!(a.clear_namespace().await, 1);
        assert_eq!(ab.get("x").await.unwrap(), Some("from-ab".to_string()));
        assert_eq!(ab.get("b:y").await.unwrap(), Some("nested".to_string()));
    }

    #[tokio::test]
    async fn test_prefixed_cache_never_aliases_another_namespace() {
        let backend = Arc::new(MemoryBackend::new());
        let prefixed: RemoteCache<String> = RemoteCache::new(
            backend.clone(),
            CacheConfig::new("a", Duration::from_secs(60))
                .unwrap()
                .with_key_prefix("b")
                .unwrap(),
        );

        prefixed.set("x", "v".into(), None).await.unwrap();

        // The namespace that would have produced the same stored key is refused
        assert!(CacheConfig::new("a:b", Duration::from_secs(60)).is_err());
        let other = remote(&backend, "b");
        assert_eq!(other.get("x").await.unwrap(), None);
    }
}
