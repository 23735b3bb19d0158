//! Layered Cache - HTTP front for a local or Redis-backed cache
//!
//! Serves a `LocalCache` by default; setting `REDIS_URL` switches to a
//! `RemoteCache` over Redis.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use layered_cache::api::create_router;
use layered_cache::cache::{LocalCache, RedisBackend, RemoteCache};
use layered_cache::{spawn_cleanup_task, AppState, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the local cache (plus TTL sweep) or connect the remote one
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "layered_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Layered Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: namespace={}, default_ttl={}s, port={}, remote={}",
        config.namespace,
        config.default_ttl,
        config.server_port,
        config.redis_url.is_some()
    );

    let cache_config = config
        .cache_config()
        .context("invalid cache configuration")?;

    let (state, cleanup_handle) = match &config.redis_url {
        Some(url) => {
            let backend = RedisBackend::connect(url)
                .await
                .with_context(|| format!("failed to connect to {url}"))?;
            let cache = RemoteCache::new(Arc::new(backend), cache_config)
                .with_options(config.remote_options());
            info!("Remote cache initialized");
            (AppState::remote(Arc::new(cache)), None)
        }
        None => {
            let cache = Arc::new(
                LocalCache::with_shards(cache_config, config.local_shards)
                    .context("invalid shard count")?,
            );
            let handle = spawn_cleanup_task(
                cache.clone(),
                Duration::from_secs(config.cleanup_interval.max(1)),
            );
            info!(shards = config.local_shards, "Local cache initialized");
            (AppState::local(cache), Some(handle))
        }
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweep task.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
