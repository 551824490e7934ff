//! Trigger pipeline for price-sentinel.
//!
//! Consumes ticks, matches them against the registry, and for each satisfied
//! alert runs notify-then-delete without blocking the next tick.

pub mod pipeline;

pub use pipeline::{TriggerPipeline, TriggerSemantics};
