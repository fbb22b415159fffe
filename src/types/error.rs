//! Error types for the stock rewards engine
//!
//! Every failure is scoped to the single operation that raised it. Business
//! rule failures are detected before anything is written, so the unit of work
//! is dropped with no partial state.
//!
//! # Error Categories
//!
//! - **NotFound**: stock, user, reward event or corporate action is absent
//! - **InvalidState**: inactive stock or user, completed action, adjustment of an adjustment
//! - **ValidationFailure**: bad ratio or quantity, refund mismatch, insufficient holdings
//! - **Duplicate**: time-window duplicate or reused idempotency key
//! - **Transient**: data store failure; the caller may retry

use super::corporate_action::CorporateActionId;
use super::reward::RewardEventId;
use super::stock::UserId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failure category, used by callers to map errors onto responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    ValidationFailure,
    Duplicate,
    Transient,
}

/// Main error type for the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Stock not found: {symbol}")]
    StockNotFound { symbol: String },

    /// The stock exists but was merged away or delisted
    #[error("Stock {symbol} is delisted")]
    StockDelisted { symbol: String },

    #[error("Stock {symbol} has no usable price")]
    PriceUnavailable { symbol: String },

    /// A split, merger or delisting is due but not yet processed
    #[error("Stock {symbol} has pending corporate action {action} past its effective date")]
    PendingCorporateAction {
        symbol: String,
        action: CorporateActionId,
    },

    #[error("User not found: {user}")]
    UserNotFound { user: UserId },

    #[error("User {user} is inactive")]
    UserInactive { user: UserId },

    #[error("Reward event not found: {reward_event}")]
    RewardEventNotFound { reward_event: RewardEventId },

    #[error("Reward event {reward_event} is an adjustment and cannot be adjusted")]
    AdjustmentOfAdjustment { reward_event: RewardEventId },

    #[error("Corporate action not found: {action}")]
    CorporateActionNotFound { action: CorporateActionId },

    #[error("Corporate action {action} has already been processed")]
    ActionAlreadyCompleted { action: CorporateActionId },

    #[error("Invalid quantity {quantity}: must be positive")]
    InvalidQuantity { quantity: Decimal },

    #[error("Full refund of reward {reward_event} must match original quantity {original}, requested {requested}")]
    RefundQuantityMismatch {
        reward_event: RewardEventId,
        original: Decimal,
        requested: Decimal,
    },

    #[error("Partial refund of reward {reward_event} must be less than original quantity {original}, requested {requested}")]
    PartialRefundTooLarge {
        reward_event: RewardEventId,
        original: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient holdings for user {user} in {symbol}: held {held}, requested {requested}")]
    InsufficientHoldings {
        user: UserId,
        symbol: String,
        held: Decimal,
        requested: Decimal,
    },

    #[error("Invalid {kind} ratio {ratio}: must be positive")]
    InvalidRatio { kind: String, ratio: Decimal },

    #[error("Merger of {symbol} requires a target stock")]
    MissingMergerTarget { symbol: String },

    #[error("Stock {symbol} cannot be merged into itself")]
    SelfMerger { symbol: String },

    /// Same user, stock and quantity rewarded within the duplicate window
    #[error("Duplicate reward detected: user {user} already received {quantity} {symbol} within the last 5 minutes")]
    DuplicateReward {
        user: UserId,
        symbol: String,
        quantity: Decimal,
    },

    #[error("Duplicate request: idempotency key '{key}' already used by reward {reward_event}")]
    IdempotencyKeyReused {
        key: String,
        reward_event: RewardEventId,
    },

    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    /// The data store rejected or failed the unit of work
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl EngineError {
    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::StockNotFound { .. }
            | EngineError::UserNotFound { .. }
            | EngineError::RewardEventNotFound { .. }
            | EngineError::CorporateActionNotFound { .. } => ErrorKind::NotFound,

            EngineError::StockDelisted { .. }
            | EngineError::PriceUnavailable { .. }
            | EngineError::PendingCorporateAction { .. }
            | EngineError::UserInactive { .. }
            | EngineError::AdjustmentOfAdjustment { .. }
            | EngineError::ActionAlreadyCompleted { .. } => ErrorKind::InvalidState,

            EngineError::InvalidQuantity { .. }
            | EngineError::RefundQuantityMismatch { .. }
            | EngineError::PartialRefundTooLarge { .. }
            | EngineError::InsufficientHoldings { .. }
            | EngineError::InvalidRatio { .. }
            | EngineError::MissingMergerTarget { .. }
            | EngineError::SelfMerger { .. }
            | EngineError::ArithmeticOverflow { .. } => ErrorKind::ValidationFailure,

            EngineError::DuplicateReward { .. } | EngineError::IdempotencyKeyReused { .. } => {
                ErrorKind::Duplicate
            }

            EngineError::Storage { .. } => ErrorKind::Transient,
        }
    }

    /// True if retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

// Helper functions for creating common errors

impl EngineError {
    pub fn stock_not_found(symbol: &str) -> Self {
        EngineError::StockNotFound {
            symbol: symbol.to_string(),
        }
    }

    pub fn stock_delisted(symbol: &str) -> Self {
        EngineError::StockDelisted {
            symbol: symbol.to_string(),
        }
    }

    pub fn insufficient_holdings(
        user: UserId,
        symbol: &str,
        held: Decimal,
        requested: Decimal,
    ) -> Self {
        EngineError::InsufficientHoldings {
            user,
            symbol: symbol.to_string(),
            held,
            requested,
        }
    }

    pub fn invalid_ratio(kind: &str, ratio: Decimal) -> Self {
        EngineError::InvalidRatio {
            kind: kind.to_string(),
            ratio,
        }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        EngineError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        EngineError::Storage {
            message: message.into(),
        }
    }
}
