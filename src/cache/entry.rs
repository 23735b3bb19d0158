//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

// == Cache Entry ==
/// A stored value with its absolute expiry.
///
/// TTL is absolute from write time; reads never extend it.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry written at `now_ms` that lives for `ttl`.
    ///
    /// Sub-millisecond TTLs are rounded up to one millisecond.
    pub fn new(value: V, ttl: Duration, now_ms: u64) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        Self {
            value,
            expires_at: now_ms.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now_ms` reaches its expiration time.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}
