//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] sentinel_store::StoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] sentinel_registry::RegistryError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] sentinel_ws::WsError),

    #[error("Notifier error: {0}")]
    Notify(#[from] sentinel_notify::NotifyError),

    #[error("API error: {0}")]
    Api(#[from] sentinel_api::ApiError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sentinel_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
