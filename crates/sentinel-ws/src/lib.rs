//! Market data feed client for price-sentinel.
//!
//! Provides:
//! - A single resilient feed connection with capped exponential backoff
//! - Session tracking so subscribers can restore state after a reconnect
//! - Tick extraction from mini ticker events
//! - Periodic reconciliation of feed subscriptions against active alerts

pub mod connection;
pub mod error;
pub mod message;
pub mod subscription;
pub mod ws_write_handle;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, DEFAULT_FEED_URL};
pub use error::{WsError, WsResult};
pub use message::{parse_feed_message, FeedMessage, SubscriptionCommand, SubscriptionMethod};
pub use subscription::{ReconcileOutcome, SubscriptionSynchronizer};
pub use ws_write_handle::WsWriteHandle;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
