//! Subscription synchronizer.
//!
//! Periodically aligns feed subscriptions with the symbols that have at least
//! one active alert. The locally remembered subscribed set is a cache: it is
//! updated optimistically when a command is queued and corrected by later
//! cycles, never by waiting for acknowledgements.

use crate::message::SubscriptionMethod;
use crate::ws_write_handle::WsWriteHandle;
use sentinel_core::symbol::MINI_TICKER_SUFFIX;
use sentinel_core::SymbolSource;
use sentinel_telemetry::Metrics;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No connection; bookkeeping untouched.
    Skipped,
    /// Symbols (lower-case) whose commands were queued this cycle.
    Applied {
        unsubscribed: Vec<String>,
        subscribed: Vec<String>,
    },
}

pub struct SubscriptionSynchronizer {
    source: Arc<dyn SymbolSource>,
    handle: WsWriteHandle,
    sessions: watch::Receiver<u64>,
    session: u64,
    interval: Duration,
    /// Lower-case symbols believed subscribed on the current session.
    subscribed: HashSet<String>,
}

impl SubscriptionSynchronizer {
    pub fn new(
        source: Arc<dyn SymbolSource>,
        handle: WsWriteHandle,
        sessions: watch::Receiver<u64>,
        interval: Duration,
    ) -> Self {
        let session = *sessions.borrow();
        Self {
            source,
            handle,
            sessions,
            session,
            interval,
            subscribed: HashSet::new(),
        }
    }

    pub fn subscribed(&self) -> &HashSet<String> {
        &self.subscribed
    }

    /// Run one reconciliation cycle.
    ///
    /// Unsubscribes are queued before subscribes. A command that fails to
    /// queue leaves its symbols' bookkeeping unchanged, so the next cycle
    /// retries them. A skipped cycle touches nothing, not even a pending
    /// session reset.
    pub async fn reconcile_once(&mut self) -> ReconcileOutcome {
        if !self.handle.is_connected() {
            debug!("Feed not connected, skipping reconciliation");
            return ReconcileOutcome::Skipped;
        }

        self.observe_session();

        let desired: HashSet<String> = self
            .source
            .desired_symbols()
            .iter()
            .map(|s| s.to_lower())
            .collect();

        let mut to_unsubscribe: Vec<String> =
            self.subscribed.difference(&desired).cloned().collect();
        let mut to_subscribe: Vec<String> =
            desired.difference(&self.subscribed).cloned().collect();
        to_unsubscribe.sort();
        to_subscribe.sort();

        let mut unsubscribed = Vec::new();
        if !to_unsubscribe.is_empty() {
            match self
                .handle
                .send_command(SubscriptionMethod::Unsubscribe, stream_names(&to_unsubscribe))
                .await
            {
                Ok(id) => {
                    for symbol in &to_unsubscribe {
                        self.subscribed.remove(symbol);
                    }
                    info!(id, symbols = ?to_unsubscribe, "Unsubscribed");
                    unsubscribed = to_unsubscribe;
                }
                Err(e) => warn!(error = %e, symbols = ?to_unsubscribe, "Unsubscribe not queued"),
            }
        }

        let mut subscribed = Vec::new();
        if !to_subscribe.is_empty() {
            match self
                .handle
                .send_command(SubscriptionMethod::Subscribe, stream_names(&to_subscribe))
                .await
            {
                Ok(id) => {
                    self.subscribed.extend(to_subscribe.iter().cloned());
                    info!(id, symbols = ?to_subscribe, "Subscribed");
                    subscribed = to_subscribe;
                }
                Err(e) => warn!(error = %e, symbols = ?to_subscribe, "Subscribe not queued"),
            }
        }

        Metrics::subscribed_symbols_set(self.subscribed.len());
        ReconcileOutcome::Applied {
            unsubscribed,
            subscribed,
        }
    }

    /// Reconcile on every interval tick and right after each new session.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sessions_open = true;

        info!(interval_secs = self.interval.as_secs(), "Subscription synchronizer started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Subscription synchronizer stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.reconcile_once().await;
                }
                changed = self.sessions.changed(), if sessions_open => {
                    if changed.is_err() {
                        debug!("Session channel closed");
                        sessions_open = false;
                        continue;
                    }
                    self.reconcile_once().await;
                }
            }
        }
    }

    /// A new session has no subscriptions: forget what the previous one had.
    fn observe_session(&mut self) {
        let session = *self.sessions.borrow_and_update();
        if session != self.session {
            if !self.subscribed.is_empty() {
                info!(
                    previous = self.session,
                    session,
                    dropped = self.subscribed.len(),
                    "New feed session, resetting subscription bookkeeping"
                );
            }
            self.subscribed.clear();
            self.session = session;
            Metrics::subscribed_symbols_set(0);
        }
    }
}

fn stream_names(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .map(|s| format!("{s}{MINI_TICKER_SUFFIX}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::message::SubscriptionCommand;
    use parking_lot::{Mutex, RwLock};
    use sentinel_core::Symbol;
    use std::sync::atomic::AtomicU64;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct FixedSource(Mutex<HashSet<Symbol>>);

    impl FixedSource {
        fn set(&self, symbols: &[&str]) {
            *self.0.lock() = symbols.iter().map(Symbol::new).collect();
        }
    }

    impl SymbolSource for FixedSource {
        fn desired_symbols(&self) -> HashSet<Symbol> {
            self.0.lock().clone()
        }
    }

    struct Harness {
        source: Arc<FixedSource>,
        state: Arc<RwLock<ConnectionState>>,
        session_tx: watch::Sender<u64>,
        rx: mpsc::Receiver<SubscriptionCommand>,
        sync: SubscriptionSynchronizer,
    }

    fn harness() -> Harness {
        let source = Arc::new(FixedSource::default());
        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (tx, rx) = mpsc::channel(16);
        let (session_tx, session_rx) = watch::channel(1);
        let handle = WsWriteHandle::new(tx, state.clone(), Arc::new(AtomicU64::new(1)));
        let sync = SubscriptionSynchronizer::new(
            source.clone(),
            handle,
            session_rx,
            Duration::from_secs(30),
        );
        Harness {
            source,
            state,
            session_tx,
            rx,
            sync,
        }
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_subscribes_desired_symbols() {
        let mut h = harness();
        h.source.set(&["BTCUSDT", "ethusdt"]);

        let outcome = h.sync.reconcile_once().await;

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                unsubscribed: vec![],
                subscribed: vec!["btcusdt".into(), "ethusdt".into()],
            }
        );
        let cmd = h.rx.recv().await.unwrap();
        assert_eq!(cmd.method, SubscriptionMethod::Subscribe);
        assert_eq!(
            cmd.params,
            vec!["btcusdt@miniTicker".to_string(), "ethusdt@miniTicker".to_string()]
        );
        assert_eq!(h.sync.subscribed(), &set(&["btcusdt", "ethusdt"]));
    }

    #[tokio::test]
    async fn test_unsubscribe_before_subscribe() {
        let mut h = harness();
        h.source.set(&["BTCUSDT"]);
        h.sync.reconcile_once().await;
        h.rx.recv().await.unwrap();

        h.source.set(&["ETHUSDT"]);
        h.sync.reconcile_once().await;

        let first = h.rx.recv().await.unwrap();
        let second = h.rx.recv().await.unwrap();
        assert_eq!(first.method, SubscriptionMethod::Unsubscribe);
        assert_eq!(first.params, vec!["btcusdt@miniTicker".to_string()]);
        assert_eq!(second.method, SubscriptionMethod::Subscribe);
        assert!(second.id > first.id);
        assert_eq!(h.sync.subscribed(), &set(&["ethusdt"]));
    }

    #[tokio::test]
    async fn test_no_commands_when_converged() {
        let mut h = harness();
        h.source.set(&["BTCUSDT"]);
        h.sync.reconcile_once().await;
        h.rx.recv().await.unwrap();

        let outcome = h.sync.reconcile_once().await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                unsubscribed: vec![],
                subscribed: vec![],
            }
        );
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_skip_when_disconnected_leaves_bookkeeping() {
        let mut h = harness();
        h.source.set(&["BTCUSDT"]);
        h.sync.reconcile_once().await;
        h.rx.recv().await.unwrap();

        *h.state.write() = ConnectionState::Reconnecting;
        h.source.set(&["ETHUSDT"]);

        assert_eq!(h.sync.reconcile_once().await, ReconcileOutcome::Skipped);
        assert_eq!(h.sync.subscribed(), &set(&["btcusdt"]));
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_skip_defers_session_reset_until_connected() {
        let mut h = harness();
        h.source.set(&["BTCUSDT"]);
        h.sync.reconcile_once().await;
        h.rx.recv().await.unwrap();

        // Reconnected, then dropped again before the next cycle.
        h.session_tx.send(2).unwrap();
        *h.state.write() = ConnectionState::Reconnecting;

        assert_eq!(h.sync.reconcile_once().await, ReconcileOutcome::Skipped);
        assert_eq!(h.sync.subscribed(), &set(&["btcusdt"]));

        *h.state.write() = ConnectionState::Connected;
        assert_eq!(
            h.sync.reconcile_once().await,
            ReconcileOutcome::Applied {
                unsubscribed: vec![],
                subscribed: vec!["btcusdt".into()],
            }
        );
    }

    #[tokio::test]
    async fn test_failed_queue_keeps_bookkeeping() {
        let mut h = harness();
        h.source.set(&["BTCUSDT"]);
        let Harness { mut sync, rx, .. } = h;
        drop(rx);

        let outcome = sync.reconcile_once().await;
        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                unsubscribed: vec![],
                subscribed: vec![],
            }
        );
        assert!(sync.subscribed().is_empty());
    }

    #[tokio::test]
    async fn test_new_session_resubscribes_everything() {
        let mut h = harness();
        h.source.set(&["BTCUSDT", "ETHUSDT"]);
        h.sync.reconcile_once().await;
        h.rx.recv().await.unwrap();

        h.session_tx.send(2).unwrap();
        let outcome = h.sync.reconcile_once().await;

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                unsubscribed: vec![],
                subscribed: vec!["btcusdt".into(), "ethusdt".into()],
            }
        );
        let cmd = h.rx.recv().await.unwrap();
        assert_eq!(cmd.method, SubscriptionMethod::Subscribe);
        assert_eq!(cmd.params.len(), 2);
    }

    #[tokio::test]
    async fn test_run_reconciles_on_new_session() {
        let h = harness();
        h.source.set(&["SOLUSDT"]);
        let Harness {
            session_tx,
            mut rx,
            sync,
            ..
        } = h;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(sync.run(shutdown.clone()));

        // First interval tick fires immediately.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.params, vec!["solusdt@miniTicker".to_string()]);

        session_tx.send(2).unwrap();
        let again = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.method, SubscriptionMethod::Subscribe);
        assert_eq!(again.params, vec!["solusdt@miniTicker".to_string()]);

        shutdown.cancel();
        task.await.unwrap();
    }
}
