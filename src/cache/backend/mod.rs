//! Key-value backends a `RemoteCache` can talk to.
//!
//! The protocol is the usual `GET` / `SET key value EX ttl` / `DEL` /
//! `SCAN cursor MATCH pattern COUNT n` shape; anything that can answer it
//! can sit behind a `RemoteCache`.

mod memory;
mod redis_store;

pub use self::memory::MemoryBackend;
pub use self::redis_store::RedisBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Network key-value store with TTL and prefix scan.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `SET key value EX ttl_secs`
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;

    /// `DEL key [key ...]`, returning how many keys existed.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// `SCAN cursor MATCH pattern COUNT count`.
    ///
    /// Returns the next cursor and a batch of matching keys. A returned
    /// cursor of `0` ends the iteration.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)>;
}

/// Redis-style glob match supporting `*`, `?` and `\` escapes.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Last `*` seen and the text position it is currently absorbing up to
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() {
            match p[pi] {
                '*' => {
                    star = Some((pi, ti));
                    pi += 1;
                    continue;
                }
                '?' => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                '\\' if pi + 1 < p.len() => {
                    if p[pi + 1] == t[ti] {
                        pi += 2;
                        ti += 1;
                        continue;
                    }
                }
                c => {
                    if c == t[ti] {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                }
            }
        }

        match star {
            Some((sp, st)) => {
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
