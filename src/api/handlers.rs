//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Cache, LocalCache, RemoteCache};
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// Holds whichever cache the server was started with behind the common
/// `Cache` contract.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn Cache<Value>>,
    pub mode: &'static str,
}

impl AppState {
    /// Serves an in-process cache.
    pub fn local(cache: Arc<LocalCache<Value>>) -> Self {
        Self {
            cache,
            mode: "local",
        }
    }

    /// Serves a cache stored in a remote backend.
    pub fn remote(cache: Arc<RemoteCache<Value>>) -> Self {
        Self {
            cache,
            mode: "remote",
        }
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidArgument(error_msg));
    }

    let ttl = req.ttl.map(Duration::from_secs);
    state.cache.set(&req.key, req.value, ttl).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Succeeds whether or not the key existed.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.delete(&key).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.cache.clear().await?;

    Ok(Json(ClearResponse::new(state.cache.config().namespace())))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from_stats(state.mode, &state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
