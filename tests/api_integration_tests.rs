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
use fetch_cache::api::{create_router, SlowOrigin};
use fetch_cache::{AppState, MemoryStore, ReadThroughCache};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_state(compute_delay: Duration) -> AppState {
    let cache = ReadThroughCache::new(Arc::new(MemoryStore::new(100)));
    AppState::new(cache, SlowOrigin::new(compute_delay), Duration::from_secs(300))
}

fn create_test_app() -> Router {
    create_router(create_test_state(Duration::ZERO))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(uri: &str, json: &'static str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == WRITE Endpoint Tests ==

#[tokio::test]
async fn test_write_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/write", r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_write_endpoint_invalid_key() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/write", r#"{"key":"","value":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

// == READ Endpoint Tests ==

#[tokio::test]
async fn test_write_then_read_structured_value() {
    let app = create_test_app();

    let write = app
        .clone()
        .oneshot(put_json(
            "/write",
            r#"{"key":"report:7","value":{"product_id":7,"average_rating":4.5},"ttl":60}"#,
        ))
        .await
        .unwrap();
    assert_eq!(write.status(), StatusCode::OK);

    let read = app.oneshot(empty("GET", "/read/report:7")).await.unwrap();
    assert_eq!(read.status(), StatusCode::OK);

    let json = body_to_json(read.into_body()).await;
    assert_eq!(json["key"], "report:7");
    assert_eq!(json["value"]["average_rating"], 4.5);
}

#[tokio::test]
async fn test_read_endpoint_not_found() {
    let response = create_test_app()
        .oneshot(empty("GET", "/read/nonexistent_key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_after_negative_ttl_is_not_found() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/write", r#"{"key":"k","value":"v","ttl":-3}"#))
        .await
        .unwrap();

    let response = app.oneshot(empty("GET", "/read/k")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == FETCH Endpoint Tests ==

#[tokio::test]
async fn test_fetch_endpoint_serves_cached_value() {
    let state = create_test_state(Duration::from_millis(20));
    let app = create_router(state.clone());

    let first = app.clone().oneshot(empty("GET", "/fetch/report:1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_to_json(first.into_body()).await;

    let second = app.oneshot(empty("GET", "/fetch/report:1")).await.unwrap();
    let second = body_to_json(second.into_body()).await;

    assert_eq!(first, second);
    assert_eq!(first["value"]["run"], 1);
    assert_eq!(state.origin.runs(), 1);
}

#[tokio::test]
async fn test_concurrent_fetch_requests_share_one_computation() {
    let state = create_test_state(Duration::from_millis(100));
    let app = create_router(state.clone());

    let requests = (0..8).map(|_| {
        let app = app.clone();
        tokio::spawn(async move { app.oneshot(empty("GET", "/fetch/hot")).await.unwrap() })
    });

    for handle in futures::future::join_all(requests).await {
        let response = handle.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["value"]["run"], 1);
    }

    assert_eq!(state.origin.runs(), 1);
}

#[tokio::test]
async fn test_fetch_prefers_written_value() {
    let state = create_test_state(Duration::ZERO);
    let app = create_router(state.clone());

    app.clone()
        .oneshot(put_json("/write", r#"{"key":"k","value":"manual"}"#))
        .await
        .unwrap();

    let response = app.oneshot(empty("GET", "/fetch/k")).await.unwrap();
    let json = body_to_json(response.into_body()).await;

    assert_eq!(json["value"], "manual");
    assert_eq!(state.origin.runs(), 0);
}

// == DELETE / CLEAR Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/write", r#"{"key":"delete_key","value":"v"}"#))
        .await
        .unwrap();

    let del = app.clone().oneshot(empty("DELETE", "/del/delete_key")).await.unwrap();
    assert_eq!(del.status(), StatusCode::OK);

    let read = app.oneshot(empty("GET", "/read/delete_key")).await.unwrap();
    assert_eq!(read.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let response = create_test_app()
        .oneshot(empty("DELETE", "/del/nonexistent_key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_endpoint() {
    let app = create_test_app();

    for body in [
        r#"{"key":"a","value":1}"#,
        r#"{"key":"b","value":2}"#,
    ] {
        app.clone().oneshot(put_json("/write", body)).await.unwrap();
    }

    let clear = app.clone().oneshot(empty("DELETE", "/clear")).await.unwrap();
    assert_eq!(clear.status(), StatusCode::OK);

    for uri in ["/read/a", "/read/b"] {
        let read = app.clone().oneshot(empty("GET", uri)).await.unwrap();
        assert_eq!(read.status(), StatusCode::NOT_FOUND);
    }
}

// == STATS / HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/write", r#"{"key":"stats_key","value":"v"}"#))
        .await
        .unwrap();
    app.clone().oneshot(empty("GET", "/read/stats_key")).await.unwrap(); // hit
    app.clone().oneshot(empty("GET", "/read/nonexistent")).await.unwrap(); // miss

    let response = app.oneshot(empty("GET", "/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["in_flight"], 0);
    assert!((json["hit_rate"].as_f64().unwrap() - 0.5).abs() < 0.001);
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_app().oneshot(empty("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store"], "memory");
    assert!(json.get("timestamp").is_some());
}
