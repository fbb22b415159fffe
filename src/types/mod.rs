//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `stock`: Stock and user records owned by external collaborators
//! - `holding`: Per-user stock positions
//! - `reward`: Reward events and the requests that create them
//! - `ledger`: Double-entry journal lines
//! - `corporate_action`: Splits, mergers and delistings
//! - `fee`: Fee configuration
//! - `command`: Replayable engine commands
//! - `error`: Error types for the engine

pub mod command;
pub mod corporate_action;
pub mod error;
pub mod fee;
pub mod holding;
pub mod ledger;
pub mod reward;
pub mod stock;

pub use command::Command;
pub use corporate_action::{
    ActionStatus, CorporateAction, CorporateActionId, CorporateActionKind, DeclareActionRequest,
    DeclaredAction,
};
pub use error::{EngineError, ErrorKind};
pub use fee::{FeeConfiguration, FeeType};
pub use holding::{HoldingKey, UserHolding};
pub use ledger::{AccountClass, EntryDirection, LedgerEntry, LedgerEntryId, NewLedgerEntry};
pub use reward::{
    AdjustRewardRequest, AdjustmentType, IssueRewardRequest, NewRewardEvent, RewardEvent,
    RewardEventId, RewardKind, RewardStatus,
};
pub use stock::{Stock, User, UserId};
