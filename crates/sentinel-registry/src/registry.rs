//! Symbol-partitioned alert index.
//!
//! Two levels: `symbol -> (alert id -> Alert)`. The outer map is a sharded
//! `DashMap`; each symbol bucket carries its own `RwLock`, so hot symbols do
//! not contend with each other.
//!
//! Lock order is always shard first, then bucket.

use dashmap::DashMap;
use parking_lot::RwLock;
use sentinel_core::{Alert, AlertId, Symbol, SymbolSource};
use sentinel_telemetry::Metrics;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

type Bucket = Arc<RwLock<HashMap<AlertId, Alert>>>;

/// In-memory mirror of the store, keyed by symbol.
#[derive(Debug, Default)]
pub struct AlertRegistry {
    buckets: DashMap<Symbol, Bucket>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an alert under its symbol bucket.
    pub fn upsert(&self, alert: Alert) {
        let symbol = alert.symbol.clone();
        let id = alert.id;
        // Insert under the entry guard so a concurrent prune cannot orphan the bucket.
        let replaced = self
            .buckets
            .entry(symbol.clone())
            .or_default()
            .write()
            .insert(id, alert)
            .is_some();

        if !replaced {
            Metrics::alert_registered();
        }
        trace!(alert_id = %id, symbol = %symbol, replaced, "Alert registered");
    }

    /// Delete an alert from the given symbol bucket. No-op if absent.
    pub fn remove(&self, id: AlertId, symbol: &Symbol) {
        self.take(id, symbol);
    }

    /// Remove an alert and return it, if this caller was the one to remove it.
    ///
    /// Used to claim an alert for triggering: of several concurrent callers
    /// at most one receives `Some`.
    pub fn take(&self, id: AlertId, symbol: &Symbol) -> Option<Alert> {
        let taken = self
            .buckets
            .get(symbol)
            .and_then(|bucket| {
                let mut guard = bucket.write();
                guard.remove(&id)
            });

        if taken.is_some() {
            Metrics::alert_unregistered();
            self.prune(symbol);
            trace!(alert_id = %id, symbol = %symbol, "Alert unregistered");
        }
        taken
    }

    /// Remove an alert without knowing its symbol. Scans every bucket.
    pub fn remove_any(&self, id: AlertId) -> Option<Alert> {
        let symbol = self
            .buckets
            .iter()
            .find(|entry| entry.value().read().contains_key(&id))
            .map(|entry| entry.key().clone())?;
        self.take(id, &symbol)
    }

    /// Snapshot of the alerts registered for `symbol`. Order is unspecified.
    pub fn lookup_by_symbol(&self, symbol: &Symbol) -> Vec<Alert> {
        self.buckets
            .get(symbol)
            .map(|bucket| {
                let guard = bucket.read();
                guard.values().cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Symbols with at least one registered alert.
    pub fn desired_symbols(&self) -> HashSet<Symbol> {
        self.buckets
            .iter()
            .filter(|entry| !entry.value().read().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn contains(&self, id: AlertId, symbol: &Symbol) -> bool {
        self.buckets
            .get(symbol)
            .map(|bucket| {
                let guard = bucket.read();
                guard.contains_key(&id)
            })
            .unwrap_or(false)
    }

    /// Total registered alerts across all symbols.
    pub fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|entry| {
                let guard = entry.value().read();
                guard.len()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, symbol: &Symbol) {
        self.buckets
            .remove_if(symbol, |_, bucket| bucket.read().is_empty());
    }
}

impl SymbolSource for AlertRegistry {
    fn desired_symbols(&self) -> HashSet<Symbol> {
        AlertRegistry::desired_symbols(self)
    }
}
