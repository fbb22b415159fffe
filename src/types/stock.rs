//! Stock and user records
//!
//! These are owned by external collaborators (market data, user management).
//! The engine reads them inside a unit of work and only ever writes a stock's
//! `current_price` and `is_active` fields while processing a corporate action.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User identifier
pub type UserId = u32;

/// A listed stock
///
/// The symbol is the unique, immutable identifier used by every other record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    /// Ticker symbol, e.g. `RELIANCE`
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Listing exchange, e.g. `NSE`
    #[serde(default)]
    pub exchange: String,

    /// Last known price per unit
    ///
    /// Divided by the split ratio when a split is processed.
    pub current_price: Decimal,

    /// Whether the stock can still be rewarded
    ///
    /// Cleared by mergers and delistings.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Stock {
    /// Create an active stock
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Stock {
            symbol: symbol.into(),
            name: name.into(),
            exchange: String::new(),
            current_price: price,
            is_active: true,
        }
    }

    /// True when the stock carries a usable price
    pub fn has_price(&self) -> bool {
        self.current_price > Decimal::ZERO
    }
}

/// A user eligible for rewards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl User {
    /// Create an active user
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        User {
            id,
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            is_active: true,
        }
    }
}

fn default_active() -> bool {
    true
}
