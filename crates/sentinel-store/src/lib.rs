//! Durable alert storage for price-sentinel.
//!
//! The store is the source of truth for alerts. Two implementations:
//! - `JournalStore`: append-only JSON Lines journal, replayed and compacted on open
//! - `MemoryStore`: process-local map, for tests and ephemeral deployments

pub mod error;
pub mod journal;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use journal::JournalStore;
pub use store::{AlertStore, MemoryStore};
