//! Reward issuance
//!
//! Turns a reward request into one ISSUANCE event, five journal lines and a
//! holding update, all committed together. Preconditions are checked in a
//! fixed order and the first failure wins:
//!
//! 1. the stock exists, is active and has a usable price
//! 2. no corporate action on the stock is pending past its effective date
//! 3. the user exists and is active
//! 4. no reward for the same user, stock and quantity in the duplicate window
//! 5. the idempotency key, if any, is not bound to a recent reward

use crate::core::engine::{RewardsEngine, DUPLICATE_WINDOW, IDEMPOTENCY_WINDOW};
use crate::core::{fee_policy, holdings, journal};
use crate::types::{EngineError, IssueRewardRequest, NewRewardEvent, RewardEvent, RewardKind};
use rust_decimal::Decimal;
use tracing::{info, warn};

impl RewardsEngine {
    /// Issue a stock reward to a user
    ///
    /// Prices the reward at the stock's current price, charges the active
    /// fees, journals the event and adds the units to the user's holding at
    /// that price.
    ///
    /// # Arguments
    ///
    /// * `request` - User, stock, quantity, description and optional idempotency key
    ///
    /// # Returns
    ///
    /// * `Ok(RewardEvent)` - The committed ISSUANCE event
    /// * `Err(EngineError)` - The first failed precondition; nothing is written
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if the quantity is not positive
    /// - `StockNotFound`, `StockDelisted`, `PriceUnavailable`
    /// - `PendingCorporateAction` if a due action has not been processed
    /// - `UserNotFound`, `UserInactive`
    /// - `DuplicateReward`, `IdempotencyKeyReused`
    /// - `ArithmeticOverflow` if the value does not fit a `Decimal`
    pub async fn issue_reward(&self, request: IssueRewardRequest) -> Result<RewardEvent, EngineError> {
        let result = self.try_issue_reward(&request).await;
        match &result {
            Ok(event) => info!(
                reward_event = event.id,
                user = event.user_id,
                symbol = %event.symbol,
                quantity = %event.quantity,
                unit_price = %event.unit_price,
                "reward issued"
            ),
            Err(error) => warn!(
                user = request.user_id,
                symbol = %request.symbol,
                quantity = %request.quantity,
                %error,
                "reward rejected"
            ),
        }
        result
    }

    async fn try_issue_reward(&self, request: &IssueRewardRequest) -> Result<RewardEvent, EngineError> {
        if request.quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity {
                quantity: request.quantity,
            });
        }

        let now = self.now();
        let mut unit = self.db.begin(&[request.symbol.as_str()], now).await;

        let stock = unit
            .stock(&request.symbol)
            .ok_or_else(|| EngineError::stock_not_found(&request.symbol))?;
        if !stock.is_active {
            return Err(EngineError::stock_delisted(&stock.symbol));
        }
        if !stock.has_price() {
            return Err(EngineError::PriceUnavailable {
                symbol: stock.symbol,
            });
        }

        if let Some(action) = unit.due_corporate_action(&stock.symbol, unit.today()) {
            return Err(EngineError::PendingCorporateAction {
                symbol: stock.symbol,
                action: action.id,
            });
        }

        let user = unit.user(request.user_id).ok_or(EngineError::UserNotFound {
            user: request.user_id,
        })?;
        if !user.is_active {
            return Err(EngineError::UserInactive { user: user.id });
        }

        if unit.has_recent_reward(user.id, &stock.symbol, request.quantity, now - DUPLICATE_WINDOW) {
            return Err(EngineError::DuplicateReward {
                user: user.id,
                symbol: stock.symbol,
                quantity: request.quantity,
            });
        }

        if let Some(key) = &request.idempotency_key {
            if let Some(owner) = unit.idempotency_owner(key, now - IDEMPOTENCY_WINDOW) {
                return Err(EngineError::IdempotencyKeyReused {
                    key: key.clone(),
                    reward_event: owner,
                });
            }
        }

        let total_value = request
            .quantity
            .checked_mul(stock.current_price)
            .ok_or_else(|| EngineError::arithmetic_overflow("reward value"))?;
        let fees = fee_policy::current_fees(&unit).charges_on(total_value)?;

        let event = unit.insert_reward_event(NewRewardEvent {
            user_id: user.id,
            symbol: stock.symbol.clone(),
            quantity: request.quantity,
            unit_price: stock.current_price,
            total_value,
            kind: RewardKind::Issuance,
            description: request.description.clone(),
            idempotency_key: request.idempotency_key.clone(),
        });

        let entries = unit.append_ledger_entries(event.id, journal::issuance_entries(&event, &fees));
        journal::ensure_balanced(&event, &fees, &entries)?;

        holdings::credit(
            &mut unit,
            user.id,
            &stock.symbol,
            request.quantity,
            stock.current_price,
        )?;

        unit.commit(now - IDEMPOTENCY_WINDOW)?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::traits::Clock;
    use crate::store::Database;
    use crate::types::{
        AccountClass, ActionStatus, CorporateAction, CorporateActionKind, EntryDirection,
        ErrorKind, FeeConfiguration, FeeType, RewardStatus, Stock, User,
    };
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Harness {
        db: Arc<Database>,
        clock: Arc<ManualClock>,
        engine: RewardsEngine,
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::new());
        db.insert_stock(Stock::new("ABC", "Abc Ltd", dec!(100)));
        let mut dead = Stock::new("OLD", "Old Ltd", dec!(10));
        dead.is_active = false;
        db.insert_stock(dead);
        db.insert_stock(Stock::new("FREE", "Unpriced Ltd", Decimal::ZERO));
        db.insert_user(User::new(1, "Asha"));
        let mut inactive = User::new(2, "Ravi");
        inactive.is_active = false;
        db.insert_user(inactive);
        db.insert_fee(FeeConfiguration::new(FeeType::Brokerage, dec!(0.0005)));
        db.insert_fee(FeeConfiguration::new(FeeType::TransactionTax, dec!(0.001)));
        db.insert_fee(FeeConfiguration::new(FeeType::TaxOnFee, dec!(0.18)));

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        ));
        let engine = RewardsEngine::with_clock(db.clone(), clock.clone());
        Harness { db, clock, engine }
    }

    #[tokio::test]
    async fn test_issue_creates_event_entries_and_holding() {
        let h = harness();

        let event = h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(10)).with_description("signup"))
            .await
            .unwrap();

        assert_eq!(event.kind, RewardKind::Issuance);
        assert_eq!(event.status, RewardStatus::Active);
        assert_eq!(event.total_value, dec!(1000));
        assert_eq!(event.unit_price, dec!(100));

        let entries = h.db.ledger_entries_for(event.id);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].account, AccountClass::StockUnits);
        assert_eq!(entries[0].direction, EntryDirection::Debit);
        let amounts: Vec<Decimal> = entries[1..].iter().map(|e| e.amount.unwrap()).collect();
        assert_eq!(amounts, vec![dec!(1000), dec!(0.5), dec!(1), dec!(0.09)]);

        let holding = h.db.holding(1, "ABC").unwrap();
        assert_eq!(holding.quantity, dec!(10));
        assert_eq!(holding.average_cost, dec!(100));
    }

    #[tokio::test]
    async fn test_second_issue_at_new_price_updates_weighted_average() {
        let h = harness();
        h.engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(10)))
            .await
            .unwrap();

        h.db.insert_stock(Stock::new("ABC", "Abc Ltd", dec!(130)));
        h.engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(5)))
            .await
            .unwrap();

        let holding = h.db.holding(1, "ABC").unwrap();
        assert_eq!(holding.quantity, dec!(15));
        assert_eq!(holding.average_cost, dec!(110));
    }

    #[rstest]
    #[case::unknown_stock(1, "NOPE", dec!(1), ErrorKind::NotFound)]
    #[case::delisted(1, "OLD", dec!(1), ErrorKind::InvalidState)]
    #[case::unpriced(1, "FREE", dec!(1), ErrorKind::InvalidState)]
    #[case::unknown_user(9, "ABC", dec!(1), ErrorKind::NotFound)]
    #[case::inactive_user(2, "ABC", dec!(1), ErrorKind::InvalidState)]
    #[case::zero_quantity(1, "ABC", dec!(0), ErrorKind::ValidationFailure)]
    #[case::negative_quantity(1, "ABC", dec!(-3), ErrorKind::ValidationFailure)]
    #[tokio::test]
    async fn test_rejected_requests_write_nothing(
        #[case] user: u32,
        #[case] symbol: &str,
        #[case] quantity: Decimal,
        #[case] expected: ErrorKind,
    ) {
        let h = harness();

        let error = h
            .engine
            .issue_reward(IssueRewardRequest::new(user, symbol, quantity))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), expected);
        assert!(h.db.reward_events().is_empty());
        assert_eq!(h.db.ledger_entry_count(), 0);
        assert!(h.db.all_holdings().is_empty());
    }

    #[tokio::test]
    async fn test_delisted_is_distinct_from_not_found() {
        let h = harness();
        let error = h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "OLD", dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(error, EngineError::stock_delisted("OLD"));
    }

    #[tokio::test]
    async fn test_duplicate_within_five_minutes_is_rejected() {
        let h = harness();
        let request = IssueRewardRequest::new(1, "ABC", dec!(2));
        h.engine.issue_reward(request.clone()).await.unwrap();

        h.clock.advance(Duration::minutes(4));
        let error = h.engine.issue_reward(request.clone()).await.unwrap_err();
        assert!(matches!(error, EngineError::DuplicateReward { .. }));

        h.clock.advance(Duration::minutes(2));
        assert!(h.engine.issue_reward(request).await.is_ok());
        assert_eq!(h.db.reward_events().len(), 2);
    }

    #[tokio::test]
    async fn test_different_quantity_is_not_a_duplicate() {
        let h = harness();
        h.engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(2)))
            .await
            .unwrap();
        assert!(h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(3)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_idempotent_retry_persists_one_event() {
        let h = harness();
        let first = h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(1)).with_idempotency_key("req-42"))
            .await
            .unwrap();

        // Past the duplicate window but inside the idempotency window
        h.clock.advance(Duration::minutes(30));
        let error = h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(1)).with_idempotency_key("req-42"))
            .await
            .unwrap_err();

        assert_eq!(
            error,
            EngineError::IdempotencyKeyReused {
                key: "req-42".to_string(),
                reward_event: first.id,
            }
        );
        assert_eq!(h.db.reward_events().len(), 1);

        h.clock.advance(Duration::minutes(31));
        assert!(h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(1)).with_idempotency_key("req-42"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_idempotency_key_is_not_embedded_in_description() {
        let h = harness();
        let event = h
            .engine
            .issue_reward(
                IssueRewardRequest::new(1, "ABC", dec!(1))
                    .with_description("bonus")
                    .with_idempotency_key("k"),
            )
            .await
            .unwrap();
        assert_eq!(event.description, "bonus");
        assert_eq!(event.idempotency_key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_due_pending_action_blocks_issuance() {
        let h = harness();
        let today = h.clock.now().date_naive();
        let mut unit = h.db.begin(&["ABC"], h.clock.now()).await;
        let action = unit.insert_corporate_action(CorporateAction {
            id: 0,
            symbol: "ABC".to_string(),
            kind: CorporateActionKind::Split { ratio: dec!(2) },
            effective_date: today + Duration::days(1),
            status: ActionStatus::Pending,
            description: String::new(),
            created_at: h.clock.now(),
            processed_at: None,
        });
        unit.commit(h.clock.now()).unwrap();

        // Not yet effective
        assert!(h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(1)))
            .await
            .is_ok());

        h.clock.advance(Duration::days(1));
        let error = h
            .engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(2)))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            EngineError::PendingCorporateAction {
                symbol: "ABC".to_string(),
                action: action.id,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_fees_charge_zero() {
        let db = Arc::new(Database::new());
        db.insert_stock(Stock::new("ABC", "Abc Ltd", dec!(100)));
        db.insert_user(User::new(1, "Asha"));
        let engine = RewardsEngine::new(db.clone());

        let event = engine
            .issue_reward(IssueRewardRequest::new(1, "ABC", dec!(1)))
            .await
            .unwrap();
        let fee_total: Decimal = db.ledger_entries_for(event.id)[2..]
            .iter()
            .map(|entry| entry.amount.unwrap())
            .sum();
        assert_eq!(fee_total, Decimal::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issuance_to_same_holding_loses_no_update() {
        let h = harness();
        let mut tasks = Vec::new();

        for n in 1..=20u32 {
            let engine = h.engine.clone();
            tasks.push(tokio::spawn(async move {
                // Distinct quantities so the duplicate guard does not fire
                let quantity = Decimal::from(n);
                engine
                    .issue_reward(IssueRewardRequest::new(1, "ABC", quantity))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let holding = h.db.holding(1, "ABC").unwrap();
        assert_eq!(holding.quantity, dec!(210));
        assert_eq!(holding.average_cost, dec!(100));
        assert_eq!(h.db.ledger_entry_count(), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_retries_with_same_key_commit_once() {
        let h = harness();
        let mut tasks = Vec::new();

        for n in 1..=8u32 {
            let engine = h.engine.clone();
            tasks.push(tokio::spawn(async move {
                engine
                    .issue_reward(
                        IssueRewardRequest::new(1, "ABC", Decimal::from(n)).with_idempotency_key("same"),
                    )
                    .await
            }));
        }

        let mut succeeded = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(h.db.reward_events().len(), 1);
    }
}
