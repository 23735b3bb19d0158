//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use layered_cache::api::create_router;
use layered_cache::cache::{LocalCache, ManualClock, MemoryBackend, RemoteCache};
use layered_cache::{AppState, CacheConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn local_app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let config = CacheConfig::new("api", Duration::from_secs(300)).unwrap();
    let cache = LocalCache::new(config).with_clock(clock.clone());
    (create_router(AppState::local(Arc::new(cache))), clock)
}

fn remote_app(backend: Arc<MemoryBackend>, namespace: &str) -> Router {
    let config = CacheConfig::new(namespace, Duration::from_secs(300)).unwrap();
    let cache: RemoteCache<Value> = RemoteCache::new(backend, config);
    create_router(AppState::remote(Arc::new(cache)))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri("/set")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET / GET ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let (app, _) = local_app();

    let response = app
        .oneshot(put_json(r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_get_endpoint_returns_structured_value() {
    let (app, _) = local_app();

    let set_response = app
        .clone()
        .oneshot(put_json(r#"{"key":"user:42","value":{"name":"Ann"}}"#))
        .await
        .unwrap();
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = app.oneshot(get("/get/user:42")).await.unwrap();

    assert_eq!(get_response.status(), StatusCode::OK);
    let json = body_to_json(get_response.into_body()).await;
    assert_eq!(json["key"], "user:42");
    assert_eq!(json["value"], json!({"name": "Ann"}));
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let (app, _) = local_app();

    let response = app.oneshot(get("/get/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

// == TTL ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let (app, clock) = local_app();

    let response = app
        .clone()
        .oneshot(put_json(r#"{"key":"user:42","value":{"name":"Ann"},"ttl":60}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/get/user:42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    clock.advance(Duration::from_secs(61));

    let response = app.oneshot(get("/get/user:42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == DELETE / CLEAR ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let (app, _) = local_app();

    app.clone()
        .oneshot(put_json(r#"{"key":"to_delete","value":1}"#))
        .await
        .unwrap();

    let response = app.clone().oneshot(delete("/del/to_delete")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/get/to_delete")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_missing_key_is_ok() {
    let (app, _) = local_app();

    let response = app.oneshot(delete("/del/never_set")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_clear_endpoint_remote_keeps_other_namespaces() {
    let backend = Arc::new(MemoryBackend::new());
    let orders = remote_app(backend.clone(), "orders");
    let users = remote_app(backend.clone(), "users");

    orders
        .clone()
        .oneshot(put_json(r#"{"key":"order:7","value":{"total":12}}"#))
        .await
        .unwrap();
    users
        .clone()
        .oneshot(put_json(r#"{"key":"user:42","value":{"name":"Ann"}}"#))
        .await
        .unwrap();

    let response = orders.clone().oneshot(delete("/clear")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["namespace"], "orders");

    let response = orders.oneshot(get("/get/order:7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = users.oneshot(get("/get/user:42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// == STATS / HEALTH ==

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, _) = local_app();

    app.clone()
        .oneshot(put_json(r#"{"key":"stats_key","value":"v"}"#))
        .await
        .unwrap();
    app.clone().oneshot(get("/get/stats_key")).await.unwrap(); // hit
    app.clone().oneshot(get("/get/nope")).await.unwrap(); // miss

    let response = app.oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["mode"], "local");
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = local_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

// == Error Responses ==

#[tokio::test]
async fn test_invalid_json_request() {
    let (app, _) = local_app();

    let response = app.oneshot(put_json(r#"{"key": "#)).await.unwrap();

    // Axum rejects malformed JSON bodies before the handler runs
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_empty_key_request() {
    let (app, _) = local_app();

    let response = app
        .oneshot(put_json(r#"{"key":"","value":"v"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_zero_ttl_request() {
    let (app, _) = local_app();

    let response = app
        .oneshot(put_json(r#"{"key":"k","value":"v","ttl":0}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
