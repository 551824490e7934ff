//! Threshold alerts.

use crate::decimal::Price;
use crate::error::{CoreError, Result};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned alert identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl AlertId {
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlertId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Fires when the price rises strictly above the target.
    Above,
    /// Fires when the price falls strictly below the target.
    Below,
}

impl Direction {
    /// Whether `price` satisfies this condition against `target`.
    ///
    /// Comparison is strict: a price equal to the target never fires.
    #[inline]
    pub fn is_met(&self, price: Price, target: Price) -> bool {
        match self {
            Self::Above => price > target,
            Self::Below => price < target,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "ABOVE",
            Self::Below => "BELOW",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ABOVE" => Ok(Self::Above),
            "BELOW" => Ok(Self::Below),
            other => Err(CoreError::InvalidDirection(format!(
                "{other:?} (expected ABOVE or BELOW)"
            ))),
        }
    }
}

/// A persisted alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub email: String,
    pub symbol: Symbol,
    pub target_price: Price,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Whether a tick at `price` fires this alert.
    #[inline]
    pub fn is_triggered_by(&self, price: Price) -> bool {
        self.direction.is_met(price, self.target_price)
    }
}

/// Fields of an alert that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub email: String,
    pub symbol: Symbol,
    pub target_price: Price,
    pub direction: Direction,
}

impl NewAlert {
    /// Build and validate alert fields at the API boundary.
    ///
    /// The core trusts alerts that passed this check and never re-validates them.
    pub fn validated(
        email: &str,
        symbol: &str,
        target_price: Price,
        direction: Direction,
    ) -> Result<Self> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(CoreError::InvalidEmail(email.to_string()));
        }

        let symbol = Symbol::new(symbol);
        if symbol.is_empty() || !symbol.as_str().chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidSymbol(symbol.to_string()));
        }

        if !target_price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "{target_price} (must be greater than 0)"
            )));
        }

        Ok(Self {
            email: email.to_string(),
            symbol,
            target_price,
            direction,
        })
    }

    /// Attach the store-assigned identity.
    pub fn into_alert(self, id: AlertId, created_at: DateTime<Utc>) -> Alert {
        Alert {
            id,
            email: self.email,
            symbol: self.symbol,
            target_price: self.target_price,
            direction: self.direction,
            created_at,
        }
    }
}

/// Syntactic e-mail check: `local@domain.tld`, no whitespace, one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
