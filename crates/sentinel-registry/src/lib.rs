//! Alert registry for price-sentinel.
//!
//! - `AlertRegistry`: symbol-partitioned, concurrency-safe index of active alerts
//! - `AlertBook`: keeps the store and the registry in lockstep

pub mod book;
pub mod error;
pub mod registry;

pub use book::AlertBook;
pub use error::{RegistryError, RegistryResult};
pub use registry::AlertRegistry;
