//! price-sentinel service.
//!
//! Wires every component together:
//! - Alert store and registry (bootstrapped at startup)
//! - Market data feed connection and subscription synchronizer
//! - Trigger pipeline with the configured notifier
//! - HTTP API

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, RunningApp};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
