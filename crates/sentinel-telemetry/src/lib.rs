//! Prometheus metrics and structured logging for price-sentinel.
//!
//! Provides:
//! - Prometheus metrics for feed connectivity, ticks, triggers and subscriptions
//! - Structured logging with tracing (JSON in production, pretty otherwise)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{encode_metrics, Metrics};
