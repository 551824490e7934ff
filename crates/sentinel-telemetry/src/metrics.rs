//! Prometheus metrics for price-sentinel.
//!
//! Covers:
//! - Feed connection state and reconnects
//! - Tick intake and discards
//! - Alert triggers and notification failures
//! - Registry size and feed subscriptions
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a programming error that should crash at
//! startup. These panics only occur during static initialization.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_int_counter, register_int_gauge, CounterVec,
    Encoder, Gauge, IntCounter, IntGauge, TextEncoder,
};

/// Feed connection state (1 = connected, 0 = disconnected).
pub static FEED_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "sentinel_feed_connected",
        "Market data feed connection state (1=connected)"
    )
    .unwrap()
});

/// Total feed reconnection attempts.
/// Labels: reason (closed/error)
pub static FEED_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_feed_reconnect_total",
        "Total market data feed reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Ticks received from the feed.
pub static TICKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("sentinel_ticks_total", "Total ticks received from the feed").unwrap()
});

/// Ticks discarded before evaluation.
/// Labels: reason (bad_price)
pub static TICKS_DISCARDED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_ticks_discarded_total",
        "Total ticks discarded before alert evaluation",
        &["reason"]
    )
    .unwrap()
});

/// Alerts triggered.
/// Labels: symbol, direction
pub static TRIGGERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_triggers_total",
        "Total alerts triggered",
        &["symbol", "direction"]
    )
    .unwrap()
});

/// Notification delivery failures.
/// Labels: backend
pub static NOTIFY_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_notify_failed_total",
        "Total alert notifications that failed to send",
        &["backend"]
    )
    .unwrap()
});

/// Alerts currently held in the in-memory registry.
pub static ACTIVE_ALERTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "sentinel_active_alerts",
        "Alerts currently registered for tick evaluation"
    )
    .unwrap()
});

/// Symbols currently subscribed on the feed (local bookkeeping).
pub static SUBSCRIBED_SYMBOLS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "sentinel_subscribed_symbols",
        "Symbols currently subscribed on the market data feed"
    )
    .unwrap()
});

/// Subscription commands sent.
/// Labels: method (SUBSCRIBE/UNSUBSCRIBE)
pub static SUBSCRIPTION_COMMANDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sentinel_subscription_commands_total",
        "Total subscription commands queued for the feed",
        &["method"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    pub fn feed_connected() {
        FEED_CONNECTED.set(1.0);
    }

    pub fn feed_disconnected() {
        FEED_CONNECTED.set(0.0);
    }

    pub fn feed_reconnect(reason: &str) {
        FEED_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn tick_received() {
        TICKS_TOTAL.inc();
    }

    pub fn tick_discarded(reason: &str) {
        TICKS_DISCARDED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn alert_triggered(symbol: &str, direction: &str) {
        TRIGGERS_TOTAL.with_label_values(&[symbol, direction]).inc();
    }

    pub fn notify_failed(backend: &str) {
        NOTIFY_FAILED_TOTAL.with_label_values(&[backend]).inc();
    }

    pub fn alert_registered() {
        ACTIVE_ALERTS.inc();
    }

    pub fn alert_unregistered() {
        ACTIVE_ALERTS.dec();
    }

    pub fn subscribed_symbols_set(count: usize) {
        SUBSCRIBED_SYMBOLS.set(count as i64);
    }

    pub fn subscription_command(method: &str) {
        SUBSCRIPTION_COMMANDS_TOTAL.with_label_values(&[method]).inc();
    }
}

/// Render every registered metric in the Prometheus text format.
pub fn encode_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
