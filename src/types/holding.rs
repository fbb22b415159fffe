//! Per-user stock positions

use super::stock::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Unique key of a holding: one row per (user, stock)
pub type HoldingKey = (UserId, String);

/// A user's running position in one stock
///
/// Created on the first reward for a (user, stock) pair and never deleted.
/// Reversals and corporate actions only ever shrink the quantity down to zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserHolding {
    /// Owner of the position
    pub user_id: UserId,

    /// Stock symbol
    pub symbol: String,

    /// Units held, never negative
    pub quantity: Decimal,

    /// Volume-weighted average cost per unit
    pub average_cost: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserHolding {
    /// Create an empty position
    pub fn new(user_id: UserId, symbol: impl Into<String>, now: DateTime<Utc>) -> Self {
        UserHolding {
            user_id,
            symbol: symbol.into(),
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key of this holding in the store
    pub fn key(&self) -> HoldingKey {
        (self.user_id, self.symbol.clone())
    }

    /// Total cost basis (`quantity * average_cost`)
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.average_cost
    }

    /// True if the position holds any units
    pub fn is_open(&self) -> bool {
        self.quantity > Decimal::ZERO
    }
}
