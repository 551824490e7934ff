//! Raw price updates from the live feed.

use crate::symbol::Symbol;

/// A single price update for one instrument.
///
/// The price is kept as the feed's decimal string; consumers parse it and
/// discard the tick when parsing fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub symbol: Symbol,
    pub price: String,
}

impl Tick {
    pub fn new(symbol: impl Into<Symbol>, price: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: price.into(),
        }
    }
}
