//! Write handle for queuing subscription commands.
//!
//! The handle is channel-based and survives reconnects: commands are queued
//! here and written by the connection's message loop.

use crate::connection::ConnectionState;
use crate::error::{WsError, WsResult};
use crate::message::{SubscriptionCommand, SubscriptionMethod};
use parking_lot::RwLock;
use sentinel_telemetry::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Cloneable sender for feed commands.
#[derive(Clone)]
pub struct WsWriteHandle {
    tx: mpsc::Sender<SubscriptionCommand>,
    state: Arc<RwLock<ConnectionState>>,
    next_id: Arc<AtomicU64>,
}

impl WsWriteHandle {
    pub fn new(
        tx: mpsc::Sender<SubscriptionCommand>,
        state: Arc<RwLock<ConnectionState>>,
        next_id: Arc<AtomicU64>,
    ) -> Self {
        Self { tx, state, next_id }
    }

    /// Queue a batched command. Returns the command id.
    ///
    /// Best-effort: success means queued, not delivered or acknowledged.
    ///
    /// # Errors
    ///
    /// - `WsError::NotConnected`: no live connection
    /// - `WsError::ChannelClosed`: the connection manager is gone
    pub async fn send_command(
        &self,
        method: SubscriptionMethod,
        params: Vec<String>,
    ) -> WsResult<u64> {
        if !self.is_connected() {
            return Err(WsError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = params.len();
        self.tx
            .send(SubscriptionCommand::new(method, params, id))
            .await
            .map_err(|_| WsError::ChannelClosed)?;

        Metrics::subscription_command(method.as_str());
        debug!(id, method = method.as_str(), streams = count, "Command queued");
        Ok(id)
    }

    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionState::Connected
    }
}
