//! Layered Cache - TTL caches with pluggable population strategies
//!
//! Provides a thread-safe local cache, a namespaced client for a remote
//! key-value store, and read-through / write-around / write-through
//! "get or compute" strategies over either of them.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod strategy;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheStats, LocalCache, RemoteCache};
pub use config::{CacheConfig, Config};
pub use error::CacheError;
pub use strategy::{CacheStrategy, ReadThrough, WriteAround, WriteThrough};
pub use tasks::spawn_cleanup_task;
