//! HTTP server implementation using axum.

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use parking_lot::RwLock;
use sentinel_core::{Alert, AlertId, Direction, NewAlert, Price};
use sentinel_registry::{AlertBook, RegistryResult};
use sentinel_telemetry::encode_metrics;
use sentinel_ws::ConnectionState;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    book: AlertBook,
    feed_state: Arc<RwLock<ConnectionState>>,
}

impl AppState {
    pub fn new(book: AlertBook, feed_state: Arc<RwLock<ConnectionState>>) -> Self {
        Self { book, feed_state }
    }
}

/// Body of `POST /api/alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub email: String,
    pub symbol: String,
    pub target_price: Price,
    pub direction: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    email: Option<String>,
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/{id}", delete(delete_alert))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn create_alert(
    State(state): State<AppState>,
    payload: Result<Json<CreateAlertRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Alert>)> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let direction =
        Direction::from_str(&req.direction).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let new = NewAlert::validated(&req.email, &req.symbol, req.target_price, direction)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let book = state.book.clone();
    let alert = blocking("Failed to create alert", move || book.create(new)).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    let email = query
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email query parameter is required".to_string()))?;

    let book = state.book.clone();
    let alerts = blocking("Failed to retrieve alerts", move || book.list_by_email(&email)).await?;
    Ok(Json(alerts))
}

async fn delete_alert(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = AlertId::from_str(&raw_id)
        .map_err(|_| ApiError::BadRequest("Invalid alert ID".to_string()))?;

    let book = state.book.clone();
    let deleted = blocking("Failed to delete alert", move || book.delete(id)).await?;
    Ok(Json(json!({ "success": deleted })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let feed = state.feed_state.read().as_str();
    Json(json!({
        "status": "ok",
        "feed": feed,
        "activeAlerts": state.book.registry().len(),
    }))
}

async fn metrics() -> ApiResult<impl IntoResponse> {
    let body = encode_metrics().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        ApiError::Internal("Failed to encode metrics".to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// Run a store-backed book operation off the async workers.
///
/// Failures are logged here and surface to the caller as a generic 500.
async fn blocking<T, F>(context: &'static str, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> RegistryResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!(error = %e, "{context}");
            Err(ApiError::Internal(context.to_string()))
        }
        Err(e) => {
            error!(error = %e, "{context}: task failed");
            Err(ApiError::Internal(context.to_string()))
        }
    }
}

/// Serve the API until `shutdown` is cancelled.
pub async fn run_server(
    state: AppState,
    config: ApiConfig,
    shutdown: CancellationToken,
) -> ApiResult<()> {
    let app = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Starting alert API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Alert API server stopped");
    Ok(())
}
