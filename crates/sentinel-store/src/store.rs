//! Alert store contract and the in-memory implementation.

use crate::error::{StoreError, StoreResult};
use chrono::Utc;
use parking_lot::Mutex;
use sentinel_core::{Alert, AlertId, NewAlert};
use std::collections::BTreeMap;

/// Durable alert storage.
///
/// Implementations serialize conflicting writes to the same ID. Deleting an
/// absent ID is not an error: it returns `Ok(false)`.
pub trait AlertStore: Send + Sync {
    /// Persist a new alert and assign its ID.
    fn create(&self, new: NewAlert) -> StoreResult<Alert>;

    /// All alerts registered by `email`, ordered by ID.
    fn find_by_email(&self, email: &str) -> StoreResult<Vec<Alert>>;

    /// `Ok(None)` when the alert does not exist.
    fn find_by_id(&self, id: AlertId) -> StoreResult<Option<Alert>>;

    /// Returns whether an alert was actually deleted.
    fn delete(&self, id: AlertId) -> StoreResult<bool>;

    /// Every stored alert, used to populate the registry at startup.
    fn load_all(&self) -> StoreResult<Vec<Alert>>;
}

/// Live alerts plus the ID sequence. Shared by both store implementations.
#[derive(Debug)]
pub(crate) struct AlertTable {
    alerts: BTreeMap<AlertId, Alert>,
    next_id: u64,
}

impl Default for AlertTable {
    fn default() -> Self {
        Self {
            alerts: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl AlertTable {
    /// Build the alert for the next ID without inserting it.
    pub(crate) fn prepare(&self, new: NewAlert) -> StoreResult<Alert> {
        if self.next_id == u64::MAX {
            return Err(StoreError::IdExhausted);
        }
        Ok(new.into_alert(AlertId::new(self.next_id), Utc::now()))
    }

    /// Insert an alert and advance the sequence past its ID.
    pub(crate) fn insert(&mut self, alert: Alert) {
        self.observe_id(alert.id.value().saturating_add(1));
        self.alerts.insert(alert.id, alert);
    }

    pub(crate) fn remove(&mut self, id: AlertId) -> Option<Alert> {
        self.alerts.remove(&id)
    }

    pub(crate) fn contains(&self, id: AlertId) -> bool {
        self.alerts.contains_key(&id)
    }

    pub(crate) fn get(&self, id: AlertId) -> Option<Alert> {
        self.alerts.get(&id).cloned()
    }

    pub(crate) fn by_email(&self, email: &str) -> Vec<Alert> {
        self.alerts
            .values()
            .filter(|a| a.email == email)
            .cloned()
            .collect()
    }

    pub(crate) fn all(&self) -> Vec<Alert> {
        self.alerts.values().cloned().collect()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    /// IDs are never reused, even after the highest alert is deleted.
    pub(crate) fn observe_id(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }
}

/// Process-local alert store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<AlertTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertStore for MemoryStore {
    fn create(&self, new: NewAlert) -> StoreResult<Alert> {
        let mut table = self.table.lock();
        let alert = table.prepare(new)?;
        table.insert(alert.clone());
        Ok(alert)
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Vec<Alert>> {
        Ok(self.table.lock().by_email(email))
    }

    fn find_by_id(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        Ok(self.table.lock().get(id))
    }

    fn delete(&self, id: AlertId) -> StoreResult<bool> {
        Ok(self.table.lock().remove(id).is_some())
    }

    fn load_all(&self) -> StoreResult<Vec<Alert>> {
        Ok(self.table.lock().all())
    }
}
