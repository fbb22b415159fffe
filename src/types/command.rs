//! Replayable engine commands
//!
//! One command per row of a command journal. Rows refer to each other through
//! labels: an `issue` or corporate-action row may name its result, and later
//! `refund`, `partial_refund` and `process` rows refer to that name.

use super::corporate_action::{CorporateActionKind, DeclareActionRequest};
use super::reward::{AdjustmentType, IssueRewardRequest};
use rust_decimal::Decimal;

/// A single engine operation read from a command journal
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Issue a reward, optionally naming the resulting event
    Issue {
        label: Option<String>,
        request: IssueRewardRequest,
    },

    /// Refund or partially refund the issuance named `reward`
    Adjust {
        reward: String,
        adjustment_type: AdjustmentType,
        quantity: Decimal,
        reason: String,
    },

    /// Declare a corporate action, optionally naming it
    Declare {
        label: Option<String>,
        request: DeclareActionRequest,
    },

    /// Process the corporate action named `action`
    Process { action: String },
}

impl Command {
    /// Operation name as written in the journal
    pub fn op(&self) -> &'static str {
        match self {
            Command::Issue { .. } => "issue",
            Command::Adjust {
                adjustment_type: AdjustmentType::Refund,
                ..
            } => "refund",
            Command::Adjust {
                adjustment_type: AdjustmentType::PartialRefund,
                ..
            } => "partial_refund",
            Command::Declare { request, .. } => match request.kind {
                CorporateActionKind::Split { .. } => "split",
                CorporateActionKind::Merger { .. } => "merger",
                CorporateActionKind::Delisting => "delisting",
            },
            Command::Process { .. } => "process",
        }
    }

    /// True for commands that may touch more than one stock
    ///
    /// Processing a merger rewrites two stocks, so replays never run a
    /// `process` row concurrently with anything else.
    pub fn is_barrier(&self) -> bool {
        matches!(self, Command::Process { .. })
    }
}
