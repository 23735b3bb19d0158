//! Configuration Module
//!
//! Holds the per-cache `CacheConfig` (namespace, key prefix, default TTL)
//! and the process-level `Config` loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::RemoteOptions;
use crate::error::{CacheError, Result};

/// Separator between namespace, prefix and caller key.
pub const KEY_SEPARATOR: char = ':';

// == Cache Config ==
/// Immutable settings shared by every operation of one cache instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    default_ttl: Duration,
    namespace: String,
    key_prefix: Option<String>,
}

impl CacheConfig {
    /// Creates a config for `namespace` with the given default TTL.
    ///
    /// Fails with `InvalidArgument` if the namespace is empty or contains
    /// [`KEY_SEPARATOR`], or if the TTL is zero.
    pub fn new(namespace: impl Into<String>, default_ttl: Duration) -> Result<Self> {
        let namespace = namespace.into();
        validate_segment("namespace", &namespace)?;
        validate_ttl(default_ttl)?;

        Ok(Self {
            default_ttl,
            namespace,
            key_prefix: None,
        })
    }

    /// Adds a sub-grouping segment between the namespace and caller keys.
    ///
    /// The prefix follows the same rules as the namespace.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_segment("key prefix", &prefix)?;
        self.key_prefix = Some(prefix);
        Ok(self)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key_prefix(&self) -> Option<&str> {
        self.key_prefix.as_deref()
    }

    // == Key Naming ==
    /// Builds the fully qualified key `{namespace}:{prefix}:{raw}`.
    ///
    /// The prefix segment is omitted when no prefix is configured.
    pub fn qualify(&self, raw_key: &str) -> Result<String> {
        validate_key(raw_key)?;

        let mut key = String::with_capacity(
            self.namespace.len()
                + self.key_prefix.as_ref().map_or(0, |p| p.len() + 1)
                + raw_key.len()
                + 1,
        );
        key.push_str(&self.namespace);
        key.push(KEY_SEPARATOR);
        if let Some(prefix) = &self.key_prefix {
            key.push_str(prefix);
            key.push(KEY_SEPARATOR);
        }
        key.push_str(raw_key);
        Ok(key)
    }

    /// Glob pattern matching every key of this namespace (`{namespace}:*`).
    ///
    /// Glob metacharacters inside the namespace are escaped so a namespace
    /// such as `tenant*` cannot match its siblings.
    pub fn namespace_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.namespace.len() + 2);
        for c in self.namespace.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push(KEY_SEPARATOR);
        pattern.push('*');
        pattern
    }

    /// Returns the explicit TTL or the default, rejecting zero.
    pub fn resolve_ttl(&self, ttl: Option<Duration>) -> Result<Duration> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        validate_ttl(ttl)?;
        Ok(ttl)
    }
}

/// Namespace and prefix are single key segments: non-empty, no separator.
fn validate_segment(what: &str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(CacheError::invalid(format!("{what} cannot be empty")));
    }
    if segment.contains(KEY_SEPARATOR) {
        return Err(CacheError::invalid(format!(
            "{what} cannot contain '{KEY_SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Rejects empty caller keys.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::invalid("key cannot be empty"));
    }
    Ok(())
}

/// Rejects zero TTLs.
pub fn validate_ttl(ttl: Duration) -> Result<()> {
    if ttl.is_zero() {
        return Err(CacheError::invalid("ttl must be positive"));
    }
    Ok(())
}

// == Process Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Namespace every key of the served cache lives under
    pub namespace: String,
    /// Optional extra key segment inside the namespace
    pub key_prefix: Option<String>,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds (local mode)
    pub cleanup_interval: u64,
    /// Number of independently locked partitions of the local cache
    pub local_shards: usize,
    /// Redis URL; when set the server runs a remote cache instead of a local one
    pub redis_url: Option<String>,
    /// Per-call bound on remote backend commands, in milliseconds
    pub remote_timeout_ms: u64,
    /// Keys requested per SCAN round when clearing a namespace
    pub scan_batch_size: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_NAMESPACE` - Key namespace (default: "cache")
    /// - `CACHE_KEY_PREFIX` - Optional key prefix (default: none)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `LOCAL_SHARDS` - Local cache lock partitions (default: 1)
    /// - `REDIS_URL` - Remote backend URL (default: none, local mode)
    /// - `REMOTE_TIMEOUT_MS` - Remote command timeout (default: 2000)
    /// - `SCAN_BATCH_SIZE` - SCAN COUNT hint (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            namespace: env::var("CACHE_NAMESPACE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.namespace),
            key_prefix: env::var("CACHE_KEY_PREFIX").ok().filter(|v| !v.is_empty()),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            local_shards: env_or("LOCAL_SHARDS", defaults.local_shards),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            remote_timeout_ms: env_or("REMOTE_TIMEOUT_MS", defaults.remote_timeout_ms),
            scan_batch_size: env_or("SCAN_BATCH_SIZE", defaults.scan_batch_size),
        }
    }

    /// Validated cache settings for the served cache.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        let config = CacheConfig::new(&self.namespace, Duration::from_secs(self.default_ttl))?;
        match &self.key_prefix {
            Some(prefix) => config.with_key_prefix(prefix),
            None => Ok(config),
        }
    }

    /// Remote cache tuning derived from this config.
    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            op_timeout: Duration::from_millis(self.remote_timeout_ms.max(1)),
            scan_batch_size: self.scan_batch_size.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 300,
            namespace: "cache".to_string(),
            key_prefix: None,
            server_port: 3000,
            cleanup_interval: 1,
            local_shards: 1,
            redis_url: None,
            remote_timeout_ms: 2000,
            scan_batch_size: 100,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
