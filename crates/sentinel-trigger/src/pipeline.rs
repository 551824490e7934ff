//! Tick evaluation and notify-then-delete dispatch.

use sentinel_core::{Alert, Price, Symbol, Tick};
use sentinel_notify::Notifier;
use sentinel_registry::AlertBook;
use sentinel_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// How often a matched alert may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSemantics {
    /// The alert is removed from the registry when matched, before any
    /// notification work starts. Concurrent ticks cannot select it again.
    #[default]
    AtMostOnce,
    /// Match against a snapshot and leave removal to the dispatched task.
    /// A burst of ticks may notify the same alert more than once.
    AtLeastOnce,
}

/// Matches ticks against the registry and dispatches triggered alerts.
#[derive(Clone)]
pub struct TriggerPipeline {
    book: AlertBook,
    notifier: Arc<dyn Notifier>,
    semantics: TriggerSemantics,
}

impl TriggerPipeline {
    pub fn new(book: AlertBook, notifier: Arc<dyn Notifier>, semantics: TriggerSemantics) -> Self {
        Self {
            book,
            notifier,
            semantics,
        }
    }

    pub fn semantics(&self) -> TriggerSemantics {
        self.semantics
    }

    /// Evaluate one tick and spawn notify-then-delete for every alert it
    /// fires. Returns the dispatched alerts.
    ///
    /// A tick whose price does not parse is discarded.
    pub fn evaluate(&self, tick: &Tick) -> Vec<Alert> {
        let price = match Price::from_str(&tick.price) {
            Ok(price) => price,
            Err(_) => {
                Metrics::tick_discarded("bad_price");
                trace!(symbol = %tick.symbol, price = %tick.price, "Discarding tick with bad price");
                return Vec::new();
            }
        };

        let fired = self.select(&tick.symbol, price);
        for alert in &fired {
            Metrics::alert_triggered(alert.symbol.as_str(), alert.direction.as_str());
            info!(
                alert_id = %alert.id,
                symbol = %alert.symbol,
                direction = %alert.direction,
                target = %alert.target_price,
                price = %price,
                "Alert triggered"
            );

            let pipeline = self.clone();
            let alert = alert.clone();
            tokio::spawn(async move {
                pipeline.dispatch(alert, price).await;
            });
        }
        fired
    }

    /// Alerts for `symbol` satisfied by `price`, claimed per the configured
    /// semantics.
    fn select(&self, symbol: &Symbol, price: Price) -> Vec<Alert> {
        let registry = self.book.registry();
        registry
            .lookup_by_symbol(symbol)
            .into_iter()
            .filter(|alert| alert.is_triggered_by(price))
            .filter_map(|alert| match self.semantics {
                // Only the caller that removes the alert gets to fire it.
                TriggerSemantics::AtMostOnce => registry.take(alert.id, &alert.symbol),
                TriggerSemantics::AtLeastOnce => Some(alert),
            })
            .collect()
    }

    /// Notify, then delete from store and registry.
    ///
    /// Notification failures are the notifier's concern; deletion happens
    /// regardless. The store write runs on the blocking pool.
    pub async fn dispatch(&self, alert: Alert, price: Price) {
        self.notifier.notify(&alert, price).await;

        let book = self.book.clone();
        let id = alert.id;
        match tokio::task::spawn_blocking(move || book.release(&alert)).await {
            Ok(Ok(true)) => debug!(alert_id = %id, "Triggered alert deleted"),
            Ok(Ok(false)) => debug!(alert_id = %id, "Triggered alert already deleted"),
            Ok(Err(e)) => error!(alert_id = %id, error = %e, "Failed to delete triggered alert"),
            Err(e) => error!(alert_id = %id, error = %e, "Delete task failed"),
        }
    }

    /// Consume ticks until the channel closes or shutdown is requested.
    ///
    /// Every tick is evaluated in its own task; there is no ordering between
    /// ticks.
    pub async fn run(self, mut ticks: mpsc::Receiver<Tick>, shutdown: CancellationToken) {
        info!(semantics = ?self.semantics, "Trigger pipeline started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                tick = ticks.recv() => {
                    let Some(tick) = tick else {
                        debug!("Tick channel closed");
                        break;
                    };
                    Metrics::tick_received();
                    let pipeline = self.clone();
                    tokio::spawn(async move {
                        pipeline.evaluate(&tick);
                    });
                }
            }
        }
        info!("Trigger pipeline stopped");
    }
}
