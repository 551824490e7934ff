//! Store and registry kept in lockstep.

use crate::error::RegistryResult;
use crate::registry::AlertRegistry;
use sentinel_core::{Alert, AlertId, NewAlert};
use sentinel_store::AlertStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Write path for alerts.
///
/// The store is written first; the registry follows only after the store
/// accepted the change. A crash between the two leaves the registry behind,
/// which `bootstrap` repairs on the next start.
#[derive(Clone)]
pub struct AlertBook {
    store: Arc<dyn AlertStore>,
    registry: Arc<AlertRegistry>,
}

impl AlertBook {
    pub fn new(store: Arc<dyn AlertStore>, registry: Arc<AlertRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<AlertRegistry> {
        &self.registry
    }

    /// Mirror every stored alert into the registry. Returns the count loaded.
    pub fn bootstrap(&self) -> RegistryResult<usize> {
        let alerts = self.store.load_all()?;
        let count = alerts.len();
        for alert in alerts {
            self.registry.upsert(alert);
        }
        info!(
            alerts = count,
            symbols = self.registry.desired_symbols().len(),
            "Registry populated from store"
        );
        Ok(count)
    }

    /// Persist a new alert, then register it.
    pub fn create(&self, new: NewAlert) -> RegistryResult<Alert> {
        let alert = self.store.create(new)?;
        self.registry.upsert(alert.clone());
        info!(
            alert_id = %alert.id,
            symbol = %alert.symbol,
            direction = %alert.direction,
            target = %alert.target_price,
            "Alert created"
        );
        Ok(alert)
    }

    /// Delete by ID. Returns whether the store held the alert.
    pub fn delete(&self, id: AlertId) -> RegistryResult<bool> {
        let existing = self.store.find_by_id(id)?;
        let deleted = self.store.delete(id)?;

        match existing {
            Some(alert) => self.registry.remove(id, &alert.symbol),
            None => {
                if self.registry.remove_any(id).is_some() {
                    debug!(alert_id = %id, "Dropped registry entry missing from store");
                }
            }
        }

        debug!(alert_id = %id, deleted, "Alert delete requested");
        Ok(deleted)
    }

    pub fn list_by_email(&self, email: &str) -> RegistryResult<Vec<Alert>> {
        Ok(self.store.find_by_email(email)?)
    }

    /// Retire an alert that has fired. The registry entry may already be
    /// gone if the caller claimed it.
    pub fn release(&self, alert: &Alert) -> RegistryResult<bool> {
        let deleted = self.store.delete(alert.id)?;
        self.registry.remove(alert.id, &alert.symbol);
        Ok(deleted)
    }
}
