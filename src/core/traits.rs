//! Core traits shared by the engines
//!
//! The engines never read the wall clock directly. Every unit of work takes
//! its timestamp from a `Clock`, which keeps the duplicate window, the
//! idempotency window and effective-date checks deterministic under test.

use chrono::{DateTime, Utc};
use std::fmt;

/// Source of the current time
///
/// Implementations must be cheap to call and safe to share across tasks.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}
