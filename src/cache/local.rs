//! Local Cache Module
//!
//! In-process, thread-safe TTL cache. A single mutex guards the whole map by
//! default; `with_shards` splits the keyspace into independently locked maps.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::{Cache, CacheEntry, CacheStats, Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

#[derive(Debug)]
struct Shard<V> {
    entries: HashMap<String, CacheEntry<V>>,
    stats: CacheStats,
}

impl<V> Default for Shard<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }
}

// == Local Cache ==
/// Thread-safe key/value store with absolute TTL expiry.
///
/// Expired entries are never returned: `get` removes them on sight and
/// `cleanup_expired` sweeps the rest. There is no size bound or eviction
/// policy beyond TTL.
#[derive(Debug)]
pub struct LocalCache<V> {
    config: Arc<CacheConfig>,
    shards: Box<[Mutex<Shard<V>>]>,
    hasher: RandomState,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> LocalCache<V> {
    // == Constructor ==
    /// Creates a single-lock cache using the wall clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::build(config, 1)
    }

    /// Creates a cache split into `shards` independently locked partitions.
    ///
    /// One shard is equivalent to `new`. More shards reduce contention when
    /// many threads hit unrelated keys; semantics are unchanged.
    pub fn with_shards(config: CacheConfig, shards: usize) -> Result<Self> {
        if shards == 0 {
            return Err(CacheError::invalid("shard count must be positive"));
        }
        Ok(Self::build(config, shards))
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn build(config: CacheConfig, shards: usize) -> Self {
        Self {
            config: Arc::new(config),
            shards: (0..shards).map(|_| Mutex::new(Shard::default())).collect(),
            hasher: RandomState::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn shard(&self, qualified_key: &str) -> MutexGuard<'_, Shard<V>> {
        let index = if self.shards.len() == 1 {
            0
        } else {
            (self.hasher.hash_one(qualified_key) % self.shards.len() as u64) as usize
        };
        // A panic while holding the lock cannot leave a half-written entry
        // behind, so a poisoned shard is still consistent.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_all(&self) -> impl Iterator<Item = MutexGuard<'_, Shard<V>>> {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner))
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// An expired entry is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let key = self.config.qualify(key)?;
        let now = self.clock.now_ms();
        let mut shard = self.shard(&key);

        let expired = match shard.entries.get(&key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let value = entry.value.clone();
                shard.stats.record_hit();
                return Ok(Some(value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            shard.entries.remove(&key);
            shard.stats.record_expirations(1);
            debug!(key = %key, "local cache entry expired on read");
        }
        shard.stats.record_miss();
        Ok(None)
    }

    // == Set ==
    /// Stores `value` until `now + ttl`, replacing any previous entry.
    ///
    /// `ttl` defaults to the configured TTL; a zero TTL is rejected.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        let key = self.config.qualify(key)?;
        let ttl = self.config.resolve_ttl(ttl)?;
        let entry = CacheEntry::new(value, ttl, self.clock.now_ms());

        self.shard(&key).entries.insert(key, entry);
        Ok(())
    }

    // == Delete ==
    /// Removes the entry if present. Absent keys are not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let key = self.config.qualify(key)?;
        self.shard(&key).entries.remove(&key);
        Ok(())
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) {
        for mut shard in self.lock_all() {
            shard.entries.clear();
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;

        for mut shard in self.lock_all() {
            let before = shard.entries.len();
            shard.entries.retain(|_, entry| !entry.is_expired_at(now));
            let dropped = before - shard.entries.len();
            shard.stats.record_expirations(dropped as u64);
            removed += dropped;
        }

        removed
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock_all().map(|s| s.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Stats ==
    /// Aggregated statistics across all shards.
    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for shard in self.lock_all() {
            let mut snapshot = shard.stats.clone();
            snapshot.set_total_entries(shard.entries.len());
            total.merge(&snapshot);
        }
        total
    }
}

#[async_trait]
impl<V> Cache<V> for LocalCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        LocalCache::get(self, key)
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        LocalCache::set(self, key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        LocalCache::delete(self, key)
    }

    async fn clear(&self) -> Result<()> {
        LocalCache::clear(self);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        LocalCache::stats(self)
    }

    fn config(&self) -> &CacheConfig {
        LocalCache::config(self)
    }
}
