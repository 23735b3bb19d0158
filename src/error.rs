//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for caches, strategies and the HTTP surface.
///
/// Only `InvalidArgument` ever escapes a cache operation. The backend,
/// serialization and timeout variants are produced inside `RemoteCache`
/// and its backends, logged, and degraded to a miss or a no-op.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Caller passed an empty key/namespace or a zero TTL
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Key not present (HTTP surface only; caches report misses as `None`)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Remote store rejected the command or was unreachable
    #[error("Backend {op} failed for '{key}': {message}")]
    Backend {
        op: &'static str,
        key: String,
        message: String,
    },

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Remote store did not answer within the per-call bound
    #[error("Backend {op} timed out for '{key}'")]
    Timeout { op: &'static str, key: String },
}

impl CacheError {
    /// Builds an `InvalidArgument` error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        CacheError::InvalidArgument(msg.into())
    }

    /// Wraps a backend failure with the command and key it concerned.
    pub fn backend(op: &'static str, key: impl Into<String>, err: impl Display) -> Self {
        CacheError::Backend {
            op,
            key: key.into(),
            message: err.to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Backend { .. } | CacheError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
