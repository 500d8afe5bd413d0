//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint, including
//! timer-driven expiry observed through the HTTP surface.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use ttl_cache::{api::create_router, AppState, CacheOptions, SupersedePolicy, TtlCache};

// == Helper Functions ==

fn create_test_app() -> Router {
    let cache = TtlCache::new(CacheOptions::default()).unwrap();
    create_router(AppState::new(cache))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
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
async fn test_set_then_get_round_trip() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(put_json("/set", r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));

    let response = app.oneshot(get("/get/test_key")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "test_key");
    assert_eq!(json["value"], "test_value");
}

#[tokio::test]
async fn test_set_empty_key_is_bad_request() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/set", r#"{"key":"","value":"v"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_get_missing_key_returns_error_body() {
    let app = create_test_app();

    let response = app.oneshot(get("/get/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nope"));
}

// == Expiry ==

#[tokio::test(start_paused = true)]
async fn test_entry_expires_through_http() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(put_json("/set", r#"{"key":"a","value":"1","ttl":1}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/get/a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ttl_remaining"], 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let response = app.clone().oneshot(get("/get/a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["expirations"], 1);
    assert_eq!(json["total_entries"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_entry_survives() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"p","value":"v","ttl":0}"#))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(3600)).await;

    let response = app.oneshot(get("/get/p")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["ttl_remaining"].is_null());
}

#[tokio::test(start_paused = true)]
async fn test_expiry_callback_sees_latest_value() {
    let expired = Arc::new(Mutex::new(Vec::new()));
    let sink = expired.clone();
    let cache = TtlCache::new(
        CacheOptions::default()
            .with_supersede_policy(SupersedePolicy::ReplaceTimer)
            .with_on_expired(move |key: String, value: String| {
                sink.lock().unwrap().push((key, value));
            }),
    )
    .unwrap();
    let app = create_router(AppState::new(cache));

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"b","value":"1","ttl":5}"#))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    app.clone()
        .oneshot(put_json("/set", r#"{"key":"b","value":"2","ttl":5}"#))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(4500)).await;
    let response = app.clone().oneshot(get("/get/b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let response = app.oneshot(get("/get/b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        *expired.lock().unwrap(),
        vec![("b".to_string(), "2".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_with_largest_ttl_is_kept() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(put_json(
            "/set",
            r#"{"key":"huge","value":"v","ttl":9223372036854775807}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_secs(3600)).await;

    let response = app.oneshot(get("/get/huge")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "v");
    assert!(json["ttl_remaining"].is_null());
}

// == DELETE / CONTAINS / VALUES ==

#[tokio::test]
async fn test_delete_then_delete_again() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"d","value":"v"}"#))
        .await
        .unwrap();

    let response = app.clone().oneshot(delete("/del/d")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(delete("/del/d")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/contains/d")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["present"], false);
}

#[tokio::test]
async fn test_values_snapshot() {
    let app = create_test_app();

    for (key, value) in [("x", "1"), ("y", "2"), ("z", "3")] {
        let body = format!(r#"{{"key":"{key}","value":"{value}"}}"#);
        app.clone().oneshot(put_json("/set", &body)).await.unwrap();
    }

    let response = app.oneshot(get("/values")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 3);

    let mut values: Vec<String> = json["values"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    values.sort();
    assert_eq!(values, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_stats_after_lookups() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"s","value":"v"}"#))
        .await
        .unwrap();
    app.clone().oneshot(get("/get/s")).await.unwrap();
    app.clone().oneshot(get("/get/missing")).await.unwrap();

    let response = app.oneshot(get("/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

// == Live Server ==

#[tokio::test]
async fn test_live_server_over_tcp() {
    let app = create_test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let response = client
        .put(format!("{base}/set"))
        .json(&serde_json::json!({"key": "live", "value": "yes", "ttl": 60}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let json: Value = client
        .get(format!("{base}/get/live"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["value"], "yes");

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    server.abort();
}
