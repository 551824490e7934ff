//! Router tests driven through `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use mockall::mock;
use parking_lot::RwLock;
use sentinel_api::{create_router, AppState};
use sentinel_core::{Alert, AlertId, NewAlert, Symbol};
use sentinel_registry::{AlertBook, AlertRegistry};
use sentinel_store::{AlertStore, MemoryStore, StoreError, StoreResult};
use sentinel_ws::ConnectionState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

mock! {
    pub Store {}

    impl AlertStore for Store {
        fn create(&self, new: NewAlert) -> StoreResult<Alert>;
        fn find_by_email(&self, email: &str) -> StoreResult<Vec<Alert>>;
        fn find_by_id(&self, id: AlertId) -> StoreResult<Option<Alert>>;
        fn delete(&self, id: AlertId) -> StoreResult<bool>;
        fn load_all(&self) -> StoreResult<Vec<Alert>>;
    }
}

fn app_with(store: Arc<dyn AlertStore>) -> (Router, Arc<AlertRegistry>) {
    let registry = Arc::new(AlertRegistry::new());
    let book = AlertBook::new(store, Arc::clone(&registry));
    let state = AppState::new(book, Arc::new(RwLock::new(ConnectionState::Connected)));
    (create_router(state), registry)
}

fn app() -> (Router, Arc<AlertRegistry>) {
    app_with(Arc::new(MemoryStore::new()))
}

fn failing_store() -> MockStore {
    let mut store = MockStore::new();
    store.expect_create().returning(|_| {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    });
    store.expect_find_by_id().returning(|_| Ok(None));
    store.expect_delete().returning(|_| {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    });
    store
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(body: Value) -> Request<Body> {
    Request::post("/api/alerts")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri).body(Body::empty()).unwrap()
}

fn valid_body() -> Value {
    json!({
        "email": "a@x.com",
        "symbol": "btcusdt",
        "targetPrice": 50000,
        "direction": "ABOVE"
    })
}

#[tokio::test]
async fn test_create_returns_201_and_registers() {
    let (app, registry) = app();

    let (status, body) = send(&app, post_json(valid_body())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["symbol"], "BTCUSDT");
    assert_eq!(body["targetPrice"], 50000.0);
    assert_eq!(body["direction"], "ABOVE");
    assert!(body["createdAt"].is_string());
    assert_eq!(registry.lookup_by_symbol(&Symbol::new("BTCUSDT")).len(), 1);
}

#[tokio::test]
async fn test_create_rejects_invalid_fields() {
    let (app, registry) = app();
    let cases = [
        json!({"email": "not-an-email", "symbol": "BTCUSDT", "targetPrice": 1, "direction": "ABOVE"}),
        json!({"email": "a@x.com", "symbol": "", "targetPrice": 1, "direction": "ABOVE"}),
        json!({"email": "a@x.com", "symbol": "BTCUSDT", "targetPrice": 0, "direction": "ABOVE"}),
        json!({"email": "a@x.com", "symbol": "BTCUSDT", "targetPrice": -5, "direction": "BELOW"}),
        json!({"email": "a@x.com", "symbol": "BTCUSDT", "targetPrice": 1, "direction": "SIDEWAYS"}),
        json!({"email": "a@x.com", "symbol": "BTCUSDT", "direction": "ABOVE"}),
    ];

    for case in cases {
        let (status, body) = send(&app, post_json(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case: {case}");
        assert!(body["error"].is_string(), "case: {case}");
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let (app, _) = app();
    let request = Request::post("/api/alerts")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_create_store_failure_is_500() {
    let (app, registry) = app_with(Arc::new(failing_store()));

    let (status, body) = send(&app, post_json(valid_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create alert");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_list_by_email() {
    let (app, _) = app();
    send(&app, post_json(valid_body())).await;
    let mut other = valid_body();
    other["email"] = json!("b@x.com");
    send(&app, post_json(other)).await;

    let (status, body) = send(&app, get("/api/alerts?email=a@x.com")).await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["email"], "a@x.com");

    let (status, body) = send(&app, get("/api/alerts?email=nobody@x.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_requires_email() {
    let (app, _) = app();

    for uri in ["/api/alerts", "/api/alerts?email=", "/api/alerts?email=%20"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {uri}");
        assert_eq!(body["error"], "Email query parameter is required");
    }
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let (app, registry) = app();
    let (_, created) = send(&app, post_json(valid_body())).await;
    let uri = format!("/api/alerts/{}", created["id"]);

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    assert!(registry.is_empty());

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": false}));
}

#[tokio::test]
async fn test_delete_malformed_id() {
    let (app, _) = app();
    for uri in ["/api/alerts/abc", "/api/alerts/-1", "/api/alerts/1.5"] {
        let (status, body) = send(&app, delete(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {uri}");
        assert_eq!(body["error"], "Invalid alert ID");
    }
}

#[tokio::test]
async fn test_delete_store_failure_is_500() {
    let (app, _) = app_with(Arc::new(failing_store()));

    let (status, body) = send(&app, delete("/api/alerts/1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to delete alert");
}

#[tokio::test]
async fn test_health_reports_feed_state() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["feed"], "connected");
    assert_eq!(body["activeAlerts"], 0);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (app, _) = app();
    send(&app, post_json(valid_body())).await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("sentinel_active_alerts"));
}
