//! Core business logic module
//!
//! This module contains the transaction engine and the rules it enforces:
//! - `traits` - The `Clock` abstraction every unit of work takes its time from
//! - `clock` - System and manual clocks
//! - `fee_policy` - Active fee rates and fee computation
//! - `holdings` - Per-user positions and weighted average cost
//! - `journal` - Double-entry lines and balance checks
//! - `engine` - The `RewardsEngine` entry point
//! - `issuance` - Reward issuance
//! - `adjustment` - Refunds and partial refunds
//! - `corporate_actions` - Split, merger and delisting declare/process

pub mod adjustment;
pub mod clock;
pub mod corporate_actions;
pub mod engine;
pub mod fee_policy;
pub mod holdings;
pub mod issuance;
pub mod journal;
pub mod traits;

pub use clock::{ManualClock, SystemClock};
pub use engine::{RewardsEngine, DUPLICATE_WINDOW, IDEMPOTENCY_WINDOW};
pub use fee_policy::{FeeBreakdown, FeeSchedule};
pub use journal::JournalTotals;
pub use traits::Clock;
