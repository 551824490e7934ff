//! HTTP API for price-sentinel.
//!
//! Routes:
//! - `POST /api/alerts`: create an alert
//! - `GET /api/alerts?email=`: list a user's alerts
//! - `DELETE /api/alerts/{id}`: delete an alert
//! - `GET /health`, `GET /metrics`

pub mod config;
pub mod error;
pub mod server;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{create_router, run_server, AppState, CreateAlertRequest};
