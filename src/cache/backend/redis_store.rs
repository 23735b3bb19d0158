//! Redis implementation of the backend protocol.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::KvBackend;
use crate::error::{CacheError, Result};

/// Redis-backed store.
///
/// Holds a `ConnectionManager`, which reconnects on its own and is cheap to
/// clone, so every command clones it instead of checking out a connection.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError::backend("CONNECT", url, e))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::backend("CONNECT", url, e))?;

        info!(url = %url, "connected to redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| CacheError::backend("GET", key, e))
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::backend("SET", key, e))
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.manager.clone();
        conn.del::<_, u64>(keys.to_vec())
            .await
            .map_err(|e| CacheError::backend("DEL", keys.join(" "), e))
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let mut conn = self.manager.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::backend("SCAN", pattern, e))?;
        Ok((next, keys))
    }
}
