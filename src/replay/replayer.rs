//! Applies journal commands to the engine
//!
//! The replayer owns the label bindings that let later rows refer to the
//! results of earlier ones. Bindings are shared between clones, so the batch
//! processor can hand a clone to every partition task.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::core::RewardsEngine;
use crate::types::{
    AdjustRewardRequest, Command, CorporateActionId, EngineError, RewardEventId,
};

/// Failure to apply one journal command
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    /// A refund row names a reward label no earlier row bound
    #[error("Unknown reward label '{label}'")]
    UnknownReward { label: String },

    /// A process row names an action label no earlier row bound
    #[error("Unknown corporate action label '{label}'")]
    UnknownAction { label: String },

    /// A row tries to bind a label that is already bound
    #[error("Label '{label}' is already bound")]
    DuplicateLabel { label: String },

    /// The engine rejected the command
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Executes commands against a `RewardsEngine`
#[derive(Debug, Clone)]
pub struct Replayer {
    engine: RewardsEngine,
    rewards: Arc<DashMap<String, RewardEventId>>,
    actions: Arc<DashMap<String, CorporateActionId>>,
}

impl Replayer {
    pub fn new(engine: RewardsEngine) -> Self {
        Self {
            engine,
            rewards: Arc::new(DashMap::new()),
            actions: Arc::new(DashMap::new()),
        }
    }

    pub fn engine(&self) -> &RewardsEngine {
        &self.engine
    }

    /// Reward event bound to `label`, if any
    pub fn reward_id(&self, label: &str) -> Option<RewardEventId> {
        self.rewards.get(label).map(|id| *id)
    }

    /// Corporate action bound to `label`, if any
    pub fn action_id(&self, label: &str) -> Option<CorporateActionId> {
        self.actions.get(label).map(|id| *id)
    }

    /// Apply a single command
    ///
    /// A label is bound only when the command it names succeeds, so a later
    /// row that refers to a rejected issuance fails with `UnknownReward`.
    ///
    /// # Errors
    ///
    /// Returns the engine's rejection, or a label error when a row refers to
    /// an unbound label or rebinds a bound one.
    pub async fn apply(&self, command: Command) -> Result<(), ReplayError> {
        match command {
            Command::Issue { label, request } => {
                Self::ensure_unbound(&self.rewards, label.as_deref())?;
                let event = self.engine.issue_reward(request).await?;
                if let Some(label) = label {
                    self.rewards.insert(label, event.id);
                }
            }
            Command::Adjust {
                reward,
                adjustment_type,
                quantity,
                reason,
            } => {
                let reward_event_id = self
                    .reward_id(&reward)
                    .ok_or(ReplayError::UnknownReward { label: reward })?;
                self.engine
                    .adjust_reward(AdjustRewardRequest {
                        reward_event_id,
                        adjustment_type,
                        quantity,
                        reason,
                    })
                    .await?;
            }
            Command::Declare { label, request } => {
                Self::ensure_unbound(&self.actions, label.as_deref())?;
                let declared = self.engine.declare_corporate_action(request).await?;
                if let Some(label) = label {
                    self.actions.insert(label, declared.action.id);
                }
            }
            Command::Process { action } => {
                let id = self
                    .action_id(&action)
                    .ok_or(ReplayError::UnknownAction { label: action })?;
                self.engine.process_corporate_action(id).await?;
            }
        }
        Ok(())
    }

    fn ensure_unbound<V>(bindings: &DashMap<String, V>, label: Option<&str>) -> Result<(), ReplayError> {
        match label {
            Some(label) if bindings.contains_key(label) => Err(ReplayError::DuplicateLabel {
                label: label.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use crate::types::{
        AdjustmentType, CorporateActionKind, DeclareActionRequest, IssueRewardRequest, Stock, User,
    };
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn replayer() -> Replayer {
        let db = Arc::new(Database::new());
        db.insert_stock(Stock::new("ABC", "Abc Ltd", dec!(100)));
        db.insert_user(User::new(1, "Asha"));
        Replayer::new(RewardsEngine::new(db))
    }

    fn issue(label: &str, quantity: rust_decimal::Decimal) -> Command {
        Command::Issue {
            label: Some(label.to_string()),
            request: IssueRewardRequest::new(1, "ABC", quantity),
        }
    }

    #[tokio::test]
    async fn test_labels_connect_rows() {
        let replayer = replayer();

        replayer.apply(issue("r1", dec!(10))).await.unwrap();
        replayer
            .apply(Command::Adjust {
                reward: "r1".to_string(),
                adjustment_type: AdjustmentType::PartialRefund,
                quantity: dec!(3),
                reason: "goodwill".to_string(),
            })
            .await
            .unwrap();
        replayer
            .apply(Command::Declare {
                label: Some("s1".to_string()),
                request: DeclareActionRequest {
                    symbol: "ABC".to_string(),
                    kind: CorporateActionKind::Split { ratio: dec!(2) },
                    effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    description: String::new(),
                },
            })
            .await
            .unwrap();
        replayer
            .apply(Command::Process {
                action: "s1".to_string(),
            })
            .await
            .unwrap();

        let holding = replayer.engine().database().holding(1, "ABC").unwrap();
        assert_eq!(holding.quantity, dec!(14));
        assert_eq!(holding.average_cost, dec!(50));
    }

    #[tokio::test]
    async fn test_unknown_labels_are_rejected() {
        let replayer = replayer();

        let refund = replayer
            .apply(Command::Adjust {
                reward: "nope".to_string(),
                adjustment_type: AdjustmentType::Refund,
                quantity: dec!(1),
                reason: String::new(),
            })
            .await;
        assert_eq!(
            refund,
            Err(ReplayError::UnknownReward {
                label: "nope".to_string()
            })
        );

        let process = replayer
            .apply(Command::Process {
                action: "nope".to_string(),
            })
            .await;
        assert_eq!(
            process,
            Err(ReplayError::UnknownAction {
                label: "nope".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_rejected_issue_binds_nothing() {
        let replayer = replayer();

        let result = replayer.apply(issue("r1", dec!(0))).await;

        assert!(matches!(result, Err(ReplayError::Engine(_))));
        assert_eq!(replayer.reward_id("r1"), None);
    }

    #[tokio::test]
    async fn test_label_cannot_be_rebound() {
        let replayer = replayer();
        replayer.apply(issue("r1", dec!(1))).await.unwrap();

        let result = replayer.apply(issue("r1", dec!(2))).await;

        assert_eq!(
            result,
            Err(ReplayError::DuplicateLabel {
                label: "r1".to_string()
            })
        );
        assert_eq!(
            replayer.engine().database().holding(1, "ABC").unwrap().quantity,
            dec!(1)
        );
    }
}
