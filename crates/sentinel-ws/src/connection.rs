//! Feed connection manager.
//!
//! Owns the single live connection to the market data feed. Reconnects
//! forever with capped exponential backoff. Each successful connect starts a
//! new session, published on a watch channel: a fresh connection carries no
//! subscriptions, so subscribers must restore them.

use crate::error::{WsError, WsResult};
use crate::message::{parse_feed_message, FeedMessage, SubscriptionCommand};
use crate::ws_write_handle::WsWriteHandle;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use sentinel_core::Tick;
use sentinel_telemetry::Metrics;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Raw-stream endpoint of the public market data feed.
pub const DEFAULT_FEED_URL: &str = "wss://stream.binance.com:9443/ws";

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Upper bound (exclusive) of random jitter added to each delay.
    pub reconnect_jitter_ms: u64,
    /// Outbound command queue capacity.
    pub command_channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            reconnect_base_delay_ms: 5000,
            reconnect_max_delay_ms: 60000,
            reconnect_jitter_ms: 0,
            command_channel_capacity: 64,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Feed connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    tick_tx: mpsc::Sender<Tick>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Outbound command sender (for WsWriteHandle).
    command_tx: mpsc::Sender<SubscriptionCommand>,
    /// Outbound command receiver (consumed by message loop).
    command_rx: Arc<TokioMutex<mpsc::Receiver<SubscriptionCommand>>>,
    next_command_id: Arc<AtomicU64>,
    session_tx: watch::Sender<u64>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager. Ticks are forwarded to `tick_tx`.
    pub fn new(config: ConnectionConfig, tick_tx: mpsc::Sender<Tick>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_channel_capacity.max(1));
        let (session_tx, _) = watch::channel(0);
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            tick_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            command_tx,
            command_rx: Arc::new(TokioMutex::new(command_rx)),
            next_command_id: Arc::new(AtomicU64::new(1)),
            session_tx,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a write handle for queuing subscription commands.
    pub fn write_handle(&self) -> WsWriteHandle {
        WsWriteHandle::new(
            self.command_tx.clone(),
            self.state.clone(),
            self.next_command_id.clone(),
        )
    }

    /// Session counter. Incremented on every successful connect.
    pub fn sessions(&self) -> watch::Receiver<u64> {
        self.session_tx.subscribe()
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Shared view of the connection state, for health reporting.
    pub fn state_handle(&self) -> Arc<RwLock<ConnectionState>> {
        self.state.clone()
    }

    /// Consecutive failed attempts since the last successful connect.
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    ///
    /// Cancels the shutdown token, which will cause both the message loop
    /// and reconnect loop to exit promptly.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and run the message loop, reconnecting until shutdown.
    pub async fn connect(&self) -> WsResult<()> {
        self.connect_with_retry().await
    }

    async fn connect_with_retry(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_disconnected();
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;
            let session_before = *self.session_tx.borrow();

            let reason = match self.try_connect().await {
                Ok(()) => {
                    info!("Feed connection closed");
                    "closed"
                }
                Err(e) => {
                    error!(error = %e, "Feed connection error");
                    "error"
                }
            };
            self.set_disconnected();

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                return Ok(());
            }

            // A connection that got through the handshake resets the backoff.
            if *self.session_tx.borrow() != session_before {
                attempt = 0;
            }
            attempt = attempt.saturating_add(1);
            *self.reconnect_count.write() = attempt;

            *self.state.write() = ConnectionState::Reconnecting;
            Metrics::feed_reconnect(reason);

            let delay = backoff_delay(&self.config, attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to feed");

        let connect = connect_async_tls_with_config(&self.config.url, None, true, None);
        let (ws_stream, _response) = tokio::select! {
            result = connect => result?,
            () = self.shutdown_token.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        // Commands queued for the previous connection are stale.
        let stale = self.drain_stale_commands().await;
        if stale > 0 {
            debug!(stale, "Dropped commands queued before reconnect");
        }

        *self.state.write() = ConnectionState::Connected;
        *self.reconnect_count.write() = 0;
        Metrics::feed_connected();
        self.session_tx.send_modify(|session| *session += 1);
        info!(session = *self.session_tx.borrow(), "Feed connected");

        loop {
            let outbound_recv = async { self.command_rx.lock().await.recv().await };

            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            trace!("Received ping, sending pong");
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Feed closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Feed read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("Feed stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(cmd) = outbound {
                        let text = serde_json::to_string(&cmd)?;
                        write.send(Message::Text(text)).await?;
                        debug!(
                            id = cmd.id,
                            method = cmd.method.as_str(),
                            streams = cmd.params.len(),
                            "Command sent to feed"
                        );
                    }
                }
            }
        }
    }

    async fn handle_text_message(&self, text: &str) {
        match parse_feed_message(text) {
            FeedMessage::Tick(tick) => {
                if self.tick_tx.send(tick).await.is_err() {
                    warn!("Tick receiver dropped");
                }
            }
            FeedMessage::Ack { id } => {
                debug!(id, "Command acknowledged");
            }
            FeedMessage::Rejected { id, error } => {
                warn!(id, %error, "Command rejected by feed");
            }
            FeedMessage::Ignored => {
                trace!(len = text.len(), "Ignoring non-tick message");
            }
        }
    }

    async fn drain_stale_commands(&self) -> usize {
        let mut rx = self.command_rx.lock().await;
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    fn set_disconnected(&self) {
        let was_connected = {
            let mut state = self.state.write();
            let was = *state == ConnectionState::Connected;
            *state = ConnectionState::Disconnected;
            was
        };
        if was_connected {
            Metrics::feed_disconnected();
        }
    }
}

/// Delay before reconnect `attempt` (1-based).
///
/// `base * 2^(attempt-1)`, capped at `max`, plus jitter in `[0, jitter)`.
fn backoff_delay(config: &ConnectionConfig, attempt: u32) -> Duration {
    let base = config.reconnect_base_delay_ms;
    let max = config.reconnect_max_delay_ms.max(base);

    let exponent = attempt.saturating_sub(1).min(20);
    let delay = base.saturating_mul(1u64 << exponent).min(max);

    Duration::from_millis(delay.saturating_add(rand_jitter(config.reconnect_jitter_ms)))
}

/// Pseudo-random jitter in `[0, bound)`.
fn rand_jitter(bound: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    if bound == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos) % bound
}
