//! Instrument symbols.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Feed stream suffix for per-symbol mini ticker updates.
pub const MINI_TICKER_SUFFIX: &str = "@miniTicker";

/// Case-insensitive instrument identifier (e.g. "BTCUSDT").
///
/// Always stored upper-case, which is how the feed reports symbols in
/// tick payloads. Subscription bookkeeping uses the lower-case form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, trimming whitespace and normalizing to upper case.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used for subscription bookkeeping.
    pub fn to_lower(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Feed stream name, e.g. `btcusdt@miniTicker`.
    pub fn stream_name(&self) -> String {
        format!("{}{}", self.to_lower(), MINI_TICKER_SUFFIX)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Symbol {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Source of the symbols that should currently be subscribed on the feed.
///
/// Implemented by the alert registry: a symbol is desired while at least
/// one alert is registered for it.
pub trait SymbolSource: Send + Sync {
    fn desired_symbols(&self) -> HashSet<Symbol>;
}
