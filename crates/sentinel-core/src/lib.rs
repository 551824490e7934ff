//! Core domain types for price-sentinel.
//!
//! This crate provides the fundamental types shared by every component:
//! - `Alert`, `AlertId`, `NewAlert`: threshold alerts and their boundary validation
//! - `Symbol`: case-normalized instrument identifier
//! - `Price`: precision-safe price type
//! - `Direction`: ABOVE / BELOW trigger condition
//! - `Tick`: a raw price update from the live feed

pub mod alert;
pub mod decimal;
pub mod error;
pub mod symbol;
pub mod tick;

pub use alert::{Alert, AlertId, Direction, NewAlert};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use symbol::{Symbol, SymbolSource};
pub use tick::Tick;
