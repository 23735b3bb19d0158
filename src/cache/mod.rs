//! Cache Module
//!
//! TTL caches sharing one async contract:
//! - [`LocalCache`] - in-process map behind a mutex
//! - [`RemoteCache`] - namespaced client over a [`KvBackend`]

mod backend;
mod clock;
mod codec;
mod entry;
mod local;
mod remote;
mod stats;


use std::time::Duration;

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::error::Result;

// Re-export public types
pub use backend::{KvBackend, MemoryBackend, RedisBackend};
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use codec::{Codec, JsonCodec};
pub use entry::CacheEntry;
pub use local::LocalCache;
pub use remote::{RemoteCache, RemoteOptions};
pub use stats::CacheStats;

/// Operations every cache supports, whatever stores the data.
///
/// A miss is `Ok(None)`. The only error a cache returns is
/// `CacheError::InvalidArgument`; storage trouble is absorbed.
#[async_trait]
pub trait Cache<V>: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Stores `value`; `ttl` falls back to the configured default.
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()>;

    /// Removes `key`; absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Drops every entry of this cache (the whole namespace for remote caches).
    async fn clear(&self) -> Result<()>;

    fn stats(&self) -> CacheStats;

    fn config(&self) -> &CacheConfig;
}
