//! Corporate action types
//!
//! A corporate action is declared in `Pending` state and moves to `Completed`
//! exactly once when processed. The action kind carries its own parameters, so
//! a split can never be missing its ratio and a merger can never be missing its
//! target.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Corporate action identifier
pub type CorporateActionId = u64;

/// What the action does to the source stock
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorporateActionKind {
    /// Every unit becomes `ratio` units
    Split { ratio: Decimal },

    /// Every unit becomes `ratio` units of `target`; the source is retired
    Merger { target: String, ratio: Decimal },

    /// Holders lose the position entirely; the source is retired
    Delisting,
}

impl CorporateActionKind {
    /// Stock the action moves holdings into, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            CorporateActionKind::Merger { target, .. } => Some(target.as_str()),
            CorporateActionKind::Split { .. } | CorporateActionKind::Delisting => None,
        }
    }

    /// Short label used in logs and error messages
    pub fn label(&self) -> &'static str {
        match self {
            CorporateActionKind::Split { .. } => "SPLIT",
            CorporateActionKind::Merger { .. } => "MERGER",
            CorporateActionKind::Delisting => "DELISTING",
        }
    }
}

impl fmt::Display for CorporateActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle status of a corporate action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Pending,
    /// Terminal
    Completed,
}

/// A declared corporate action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorporateAction {
    pub id: CorporateActionId,

    /// Stock the action applies to
    pub symbol: String,

    pub kind: CorporateActionKind,
    pub effective_date: NaiveDate,
    pub status: ActionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl CorporateAction {
    /// True while the action is pending and its effective date has been reached
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == ActionStatus::Pending && self.effective_date <= today
    }

    /// Every stock this action touches, source first
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols = vec![self.symbol.clone()];
        if let Some(target) = self.kind.target() {
            symbols.push(target.to_string());
        }
        symbols
    }
}

/// Input to corporate action declaration
#[derive(Debug, Clone, PartialEq)]
pub struct DeclareActionRequest {
    pub symbol: String,
    pub kind: CorporateActionKind,
    pub effective_date: NaiveDate,
    pub description: String,
}

/// Result of declaring a corporate action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredAction {
    pub action: CorporateAction,

    /// Users holding a positive quantity of the source stock at declaration time
    pub affected_users: usize,
}
