//! Reward and corporate-action transaction engine
//!
//! This module provides the `RewardsEngine`, the entry point for every
//! operation that changes holdings or the journal. Each operation:
//!
//! - opens one unit of work holding the locks of the stocks it touches
//! - reads policy and state through that unit
//! - validates every business rule before writing anything
//! - stages its writes and commits them as a whole
//!
//! The operations themselves live next to their rules:
//! - `issuance` - `issue_reward`
//! - `adjustment` - `adjust_reward`
//! - `corporate_actions` - `declare_corporate_action`, `process_corporate_action`

use crate::core::clock::SystemClock;
use crate::core::fee_policy::{self, FeeSchedule};
use crate::core::traits::Clock;
use crate::store::Database;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Window in which a reward for the same user, stock and quantity is
/// rejected as a duplicate
pub const DUPLICATE_WINDOW: Duration = Duration::minutes(5);

/// How long an idempotency key stays bound to the reward that used it
pub const IDEMPOTENCY_WINDOW: Duration = Duration::hours(1);

/// Transaction engine over a shared store
///
/// Cheap to clone; clones share the store and the clock, so one engine can
/// be handed to many concurrent tasks.
#[derive(Debug, Clone)]
pub struct RewardsEngine {
    pub(crate) db: Arc<Database>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl RewardsEngine {
    /// Create an engine on the system clock
    ///
    /// # Arguments
    ///
    /// * `db` - Store shared with any other engine or reader
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Create an engine that takes its timestamps from `clock`
    pub fn with_clock(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        RewardsEngine { db, clock }
    }

    /// The store this engine writes to
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Active fee rates as of now
    ///
    /// Reads through a unit of work with no stock locks, so the result is a
    /// consistent snapshot of the fee table.
    pub async fn current_fees(&self) -> FeeSchedule {
        let unit = self.db.begin::<&str>(&[], self.now()).await;
        fee_policy::current_fees(&unit)
    }
}
