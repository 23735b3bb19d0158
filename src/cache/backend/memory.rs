//! In-process stand-in for the remote store.
//!
//! Speaks the same protocol as `RedisBackend` so a `RemoteCache` can run in
//! single-process deployments and in tests without a server.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{glob_match, KvBackend};
use crate::cache::{Clock, SystemClock};
use crate::error::{CacheError, Result};

#[derive(Debug)]
struct Stored {
    bytes: Vec<u8>,
    expires_at: u64,
    seq: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, Stored>,
    /// Insertion sequence -> key. SCAN cursors are sequence numbers, so
    /// deleting keys between rounds never makes a scan skip survivors.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(stored) => {
                self.order.remove(&stored.seq);
                true
            }
            None => false,
        }
    }
}

/// Shared in-memory key-value store with TTL and glob scan.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_seq: 1,
                ..MemoryState::default()
            }),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live (unexpired) keys across all namespaces.
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.state()
            .entries
            .values()
            .filter(|s| s.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now_ms();
        let mut state = self.state();

        let expired = match state.entries.get(key) {
            Some(stored) if stored.expires_at > now => return Ok(Some(stored.bytes.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        if ttl_secs == 0 {
            return Err(CacheError::backend("SET", key, "invalid expire time"));
        }
        let expires_at = self
            .clock
            .now_ms()
            .saturating_add(ttl_secs.saturating_mul(1000));
        let mut state = self.state();

        if let Some(stored) = state.entries.get_mut(key) {
            stored.bytes = value;
            stored.expires_at = expires_at;
            return Ok(());
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, key.to_string());
        state.entries.insert(
            key.to_string(),
            Stored {
                bytes: value,
                expires_at,
                seq,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let mut state = self.state();
        let removed = keys.iter().filter(|k| state.remove(k)).count();
        Ok(removed as u64)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let now = self.clock.now_ms();
        let count = count.max(1);
        let mut state = self.state();

        let mut keys = Vec::new();
        let mut expired = Vec::new();
        let mut next_cursor = 0;
        let mut examined = 0;

        for (&seq, key) in state.order.range(cursor..) {
            if examined == count {
                next_cursor = seq;
                break;
            }
            examined += 1;

            match state.entries.get(key) {
                Some(stored) if stored.expires_at <= now => expired.push(key.clone()),
                Some(_) if glob_match(pattern, key) => keys.push(key.clone()),
                _ => {}
            }
        }

        for key in expired {
            state.remove(&key);
        }
        Ok((next_cursor, keys))
    }
}
