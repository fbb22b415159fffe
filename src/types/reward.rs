//! Reward event types
//!
//! A reward event records stock units granted to a user (issuance) or reclaimed
//! from a user (adjustment). Events are immutable once written except for their
//! status, which tracks whether an issuance has since been reversed.

use super::stock::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reward event identifier
pub type RewardEventId = u64;

/// Kind of reward event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardKind {
    /// Units granted to the user
    Issuance,

    /// Units reclaimed from a prior issuance
    ///
    /// An adjustment can never itself be adjusted.
    Adjustment,
}

/// Lifecycle status of a reward event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardStatus {
    Active,

    /// Part of the issuance was refunded
    PartiallyReversed,

    /// The whole issuance was refunded
    Reversed,
}

/// Kind of reversal applied by the adjustment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    /// Reverse the full original quantity
    Refund,

    /// Reverse strictly less than the original quantity
    PartialRefund,
}

impl AdjustmentType {
    /// Status the original issuance moves to once this adjustment commits
    pub fn resulting_status(self) -> RewardStatus {
        match self {
            AdjustmentType::Refund => RewardStatus::Reversed,
            AdjustmentType::PartialRefund => RewardStatus::PartiallyReversed,
        }
    }
}

impl fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentType::Refund => write!(f, "REFUND"),
            AdjustmentType::PartialRefund => write!(f, "PARTIAL_REFUND"),
        }
    }
}

/// A persisted reward event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardEvent {
    pub id: RewardEventId,
    pub user_id: UserId,
    pub symbol: String,

    /// Units granted or reclaimed, always positive
    pub quantity: Decimal,

    /// Unit price the event was valued at
    ///
    /// Issuances use the market price at issuance time; adjustments reuse the
    /// original issuance price.
    pub unit_price: Decimal,

    /// `quantity * unit_price`, fees excluded
    pub total_value: Decimal,

    pub kind: RewardKind,
    pub status: RewardStatus,
    pub description: String,

    /// Caller-supplied retry token, indexed separately from the description
    pub idempotency_key: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a reward event before the store assigns an identifier
#[derive(Debug, Clone, PartialEq)]
pub struct NewRewardEvent {
    pub user_id: UserId,
    pub symbol: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_value: Decimal,
    pub kind: RewardKind,
    pub description: String,
    pub idempotency_key: Option<String>,
}

/// Input to reward issuance
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRewardRequest {
    pub user_id: UserId,
    pub symbol: String,
    pub quantity: Decimal,
    pub description: String,
    pub idempotency_key: Option<String>,
}

impl IssueRewardRequest {
    /// Build a request without an idempotency key
    pub fn new(user_id: UserId, symbol: impl Into<String>, quantity: Decimal) -> Self {
        IssueRewardRequest {
            user_id,
            symbol: symbol.into(),
            quantity,
            description: String::new(),
            idempotency_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Input to reward adjustment
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustRewardRequest {
    pub reward_event_id: RewardEventId,
    pub adjustment_type: AdjustmentType,
    pub quantity: Decimal,
    pub reason: String,
}
