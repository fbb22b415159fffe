//! Stock Rewards Engine Library
//!
//! # Overview
//!
//! A transaction engine for stock rewards. Users are granted shares of listed
//! stocks; every grant is priced, charged fees, journaled as balanced
//! double-entry lines and reflected in the user's holding. Grants can be
//! refunded in full or in part, and splits, mergers and delistings are
//! declared ahead of time and later applied to every holding of the stock.
//!
//! # Architecture
//!
//! - [`types`] - Records, requests and the error taxonomy
//! - [`store`] - In-memory tables with per-stock locks and all-or-nothing
//!   units of work
//! - [`core`] - Business rules:
//!   - [`core::engine`] - The `RewardsEngine` entry point and its windows
//!   - [`core::issuance`] - Reward issuance
//!   - [`core::adjustment`] - Refunds and partial refunds
//!   - [`core::corporate_actions`] - Split, merger and delisting
//!   - [`core::fee_policy`], [`core::holdings`], [`core::journal`] - Shared calculations
//! - [`io`] - Command journal parsing, seed loading and the holdings report
//! - [`replay`] - Applying journal commands, sequentially or per stock
//! - [`strategy`] - Sync and async replay pipelines
//! - [`cli`] - Command-line arguments
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_decimal::Decimal;
//! use stock_rewards_engine::{Database, IssueRewardRequest, RewardsEngine, Stock, User};
//!
//! # async fn run() -> Result<(), stock_rewards_engine::EngineError> {
//! let db = Arc::new(Database::new());
//! db.insert_stock(Stock::new("ABC", "Abc Ltd", Decimal::from(100)));
//! db.insert_user(User::new(1, "Asha"));
//!
//! let engine = RewardsEngine::new(db);
//! let event = engine
//!     .issue_reward(IssueRewardRequest::new(1, "ABC", Decimal::from(10)))
//!     .await?;
//! assert_eq!(event.total_value, Decimal::from(1000));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod io;
pub mod replay;
pub mod store;
pub mod strategy;
pub mod types;

pub use core::{Clock, ManualClock, RewardsEngine, SystemClock};
pub use io::{write_holdings_csv, Seed};
pub use store::Database;
pub use types::{
    AdjustRewardRequest, AdjustmentType, Command, CorporateAction, CorporateActionKind,
    DeclareActionRequest, DeclaredAction, EngineError, ErrorKind, FeeConfiguration, FeeType,
    IssueRewardRequest, LedgerEntry, RewardEvent, Stock, User, UserHolding,
};
