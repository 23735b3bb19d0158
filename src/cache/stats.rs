//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and expirations.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent, expired or degraded)
    pub misses: u64,
    /// Number of entries removed because their TTL had elapsed
    pub expirations: u64,
    /// Number of remote operations that failed and were degraded
    pub backend_errors: u64,
    /// Current number of entries (local caches only)
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expirations(&mut self, count: u64) {
        self.expirations += count;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }

    /// Folds another snapshot (e.g. another shard) into this one.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.expirations += other.expirations;
        self.backend_errors += other.backend_errors;
        self.total_entries += other.total_entries;
    }
}
