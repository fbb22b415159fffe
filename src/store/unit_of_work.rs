//! Atomic unit of work against the shared store
//!
//! A `UnitOfWork` is opened by [`Database::begin`] with the locks of every
//! stock it may touch already held. Reads go through the unit and see its own
//! staged writes first. Writes are only staged; nothing is visible to other
//! units until `commit` applies the whole write set.
//!
//! Dropping a unit without committing discards the staged writes and releases
//! the locks, which is how every business rule failure aborts.

use crate::store::database::{Database, IdempotencyRecord};
use crate::types::{
    CorporateAction, CorporateActionId, EngineError, FeeConfiguration, HoldingKey, LedgerEntry,
    NewLedgerEntry, NewRewardEvent, RewardEvent, RewardEventId, RewardStatus, Stock, User,
    UserHolding, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Staged, lock-holding transaction over a [`Database`]
#[derive(Debug)]
pub struct UnitOfWork<'db> {
    db: &'db Database,
    now: DateTime<Utc>,

    /// Sorted symbols whose locks are held
    locked: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,

    stocks: HashMap<String, Stock>,
    holdings: BTreeMap<HoldingKey, UserHolding>,
    reward_events: BTreeMap<RewardEventId, RewardEvent>,
    ledger_entries: Vec<LedgerEntry>,
    corporate_actions: BTreeMap<CorporateActionId, CorporateAction>,
    idempotency_claims: Vec<(String, RewardEventId)>,

    committed: bool,
}

impl<'db> UnitOfWork<'db> {
    pub(crate) fn new(
        db: &'db Database,
        locked: Vec<String>,
        guards: Vec<OwnedMutexGuard<()>>,
        now: DateTime<Utc>,
    ) -> Self {
        UnitOfWork {
            db,
            now,
            locked,
            _guards: guards,
            stocks: HashMap::new(),
            holdings: BTreeMap::new(),
            reward_events: BTreeMap::new(),
            ledger_entries: Vec::new(),
            corporate_actions: BTreeMap::new(),
            idempotency_claims: Vec::new(),
            committed: false,
        }
    }

    /// Timestamp shared by every row this unit writes
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Calendar date used for effective-date comparisons
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn locked_symbols(&self) -> &[String] {
        &self.locked
    }

    fn is_locked(&self, symbol: &str) -> bool {
        self.locked.binary_search_by(|s| s.as_str().cmp(symbol)).is_ok()
    }

    // ---- reads ----

    pub fn stock(&self, symbol: &str) -> Option<Stock> {
        match self.stocks.get(symbol) {
            Some(stock) => Some(stock.clone()),
            None => self.db.stock(symbol),
        }
    }

    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.db.user(user_id)
    }

    /// Active fee configurations, ordered by fee type
    pub fn active_fees(&self) -> Vec<FeeConfiguration> {
        let mut fees: Vec<FeeConfiguration> = self
            .db
            .fees
            .iter()
            .filter(|entry| entry.value().is_active)
            .map(|entry| entry.value().clone())
            .collect();
        fees.sort_by_key(|fee| fee.fee_type);
        fees
    }

    pub fn holding(&self, user_id: UserId, symbol: &str) -> Option<UserHolding> {
        let key = (user_id, symbol.to_string());
        match self.holdings.get(&key) {
            Some(holding) => Some(holding.clone()),
            None => self.db.holdings.get(&key).map(|holding| holding.clone()),
        }
    }

    /// Every holding row of a stock, sorted by user
    pub fn holdings_for_stock(&self, symbol: &str) -> Vec<UserHolding> {
        let mut rows: BTreeMap<UserId, UserHolding> = self
            .db
            .holdings
            .iter()
            .filter(|entry| entry.key().1 == symbol)
            .map(|entry| (entry.key().0, entry.value().clone()))
            .collect();

        for holding in self.holdings.values().filter(|h| h.symbol == symbol) {
            rows.insert(holding.user_id, holding.clone());
        }

        rows.into_values().collect()
    }

    pub fn reward_event(&self, id: RewardEventId) -> Option<RewardEvent> {
        match self.reward_events.get(&id) {
            Some(event) => Some(event.clone()),
            None => self.db.reward_event(id),
        }
    }

    /// True if a reward event of any kind for the same user, stock and
    /// quantity was created after `since`
    pub fn has_recent_reward(
        &self,
        user_id: UserId,
        symbol: &str,
        quantity: Decimal,
        since: DateTime<Utc>,
    ) -> bool {
        let matches = |event: &RewardEvent| {
            event.user_id == user_id
                && event.symbol == symbol
                && event.quantity == quantity
                && event.created_at > since
        };

        self.reward_events.values().any(matches)
            || self.db.reward_events.iter().any(|entry| matches(entry.value()))
    }

    /// Reward that claimed `key` after `since`, if any
    pub fn idempotency_owner(&self, key: &str, since: DateTime<Utc>) -> Option<RewardEventId> {
        if let Some((_, id)) = self.idempotency_claims.iter().find(|(k, _)| k == key) {
            return Some(*id);
        }
        self.db
            .idempotency_keys
            .get(key)
            .filter(|record| record.claimed_at > since)
            .map(|record| record.reward_event_id)
    }

    pub fn corporate_action(&self, id: CorporateActionId) -> Option<CorporateAction> {
        match self.corporate_actions.get(&id) {
            Some(action) => Some(action.clone()),
            None => self.db.corporate_action(id),
        }
    }

    /// Lowest-numbered pending action on `symbol` whose effective date is on
    /// or before `today`
    pub fn due_corporate_action(&self, symbol: &str, today: NaiveDate) -> Option<CorporateAction> {
        let mut due: BTreeMap<CorporateActionId, CorporateAction> = self
            .db
            .corporate_actions
            .iter()
            .filter(|entry| entry.value().symbol == symbol)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for action in self.corporate_actions.values().filter(|a| a.symbol == symbol) {
            due.insert(action.id, action.clone());
        }

        due.into_values().find(|action| action.is_due(today))
    }

    // ---- writes ----

    /// Stage a stock row
    pub fn put_stock(&mut self, stock: Stock) {
        self.stocks.insert(stock.symbol.clone(), stock);
    }

    /// Stage a holding row (insert or update)
    pub fn put_holding(&mut self, holding: UserHolding) {
        self.holdings.insert(holding.key(), holding);
    }

    /// Stage a new reward event, assigning its identifier
    ///
    /// The event's idempotency key, if any, is claimed at commit.
    pub fn insert_reward_event(&mut self, new: NewRewardEvent) -> RewardEvent {
        let event = RewardEvent {
            id: self.db.next_reward_event_id(),
            user_id: new.user_id,
            symbol: new.symbol,
            quantity: new.quantity,
            unit_price: new.unit_price,
            total_value: new.total_value,
            kind: new.kind,
            status: RewardStatus::Active,
            description: new.description,
            idempotency_key: new.idempotency_key,
            created_at: self.now,
            updated_at: self.now,
        };

        if let Some(key) = &event.idempotency_key {
            self.idempotency_claims.push((key.clone(), event.id));
        }
        self.reward_events.insert(event.id, event.clone());
        event
    }

    /// Stage a status change on an existing reward event
    pub fn set_reward_status(
        &mut self,
        id: RewardEventId,
        status: RewardStatus,
    ) -> Result<RewardEvent, EngineError> {
        let mut event = self
            .reward_event(id)
            .ok_or(EngineError::RewardEventNotFound { reward_event: id })?;
        event.status = status;
        event.updated_at = self.now;
        self.reward_events.insert(id, event.clone());
        Ok(event)
    }

    /// Stage the journal lines of one reward event, assigning identifiers
    pub fn append_ledger_entries(
        &mut self,
        reward_event_id: RewardEventId,
        entries: Vec<NewLedgerEntry>,
    ) -> Vec<LedgerEntry> {
        let staged: Vec<LedgerEntry> = entries
            .into_iter()
            .map(|entry| LedgerEntry {
                id: self.db.next_ledger_entry_id(),
                reward_event_id,
                user_id: entry.user_id,
                direction: entry.direction,
                account: entry.account,
                symbol: entry.symbol,
                quantity: entry.quantity,
                amount: entry.amount,
                description: entry.description,
                created_at: self.now,
            })
            .collect();
        self.ledger_entries.extend(staged.iter().cloned());
        staged
    }

    /// Stage a new corporate action, assigning its identifier
    pub fn insert_corporate_action(&mut self, mut action: CorporateAction) -> CorporateAction {
        action.id = self.db.next_corporate_action_id();
        action.created_at = self.now;
        self.corporate_actions.insert(action.id, action.clone());
        action
    }

    /// Stage an update to an existing corporate action
    pub fn put_corporate_action(&mut self, action: CorporateAction) {
        self.corporate_actions.insert(action.id, action);
    }

    // ---- commit ----

    /// Validate and apply the staged write set
    ///
    /// Fails with a `Storage` error if a staged row violates referential
    /// integrity or touches a stock whose lock is not held, and with
    /// `IdempotencyKeyReused` if another unit claimed the same fresh key first.
    /// On failure nothing is applied.
    pub fn commit(mut self, idempotency_window_start: DateTime<Utc>) -> Result<(), EngineError> {
        self.check_integrity()?;
        self.claim_idempotency_keys(idempotency_window_start)?;

        for (symbol, stock) in std::mem::take(&mut self.stocks) {
            self.db.stocks.insert(symbol, stock);
        }
        for (key, holding) in std::mem::take(&mut self.holdings) {
            self.db.holdings.insert(key, holding);
        }
        for (id, event) in std::mem::take(&mut self.reward_events) {
            self.db.reward_events.insert(id, event);
        }
        for entry in std::mem::take(&mut self.ledger_entries) {
            self.db
                .ledger_entries
                .entry(entry.reward_event_id)
                .or_default()
                .push(entry);
        }
        for (id, action) in std::mem::take(&mut self.corporate_actions) {
            self.db.corporate_actions.insert(id, action);
        }

        self.committed = true;
        Ok(())
    }

    fn check_integrity(&self) -> Result<(), EngineError> {
        for symbol in self.stocks.keys() {
            self.require_lock(symbol)?;
        }

        for holding in self.holdings.values() {
            self.require_lock(&holding.symbol)?;
            if self.user(holding.user_id).is_none() {
                return Err(EngineError::storage(format!(
                    "holding references unknown user {}",
                    holding.user_id
                )));
            }
            if self.stock(&holding.symbol).is_none() {
                return Err(EngineError::storage(format!(
                    "holding references unknown stock {}",
                    holding.symbol
                )));
            }
            if holding.quantity < Decimal::ZERO {
                return Err(EngineError::storage(format!(
                    "negative holding for user {} in {}",
                    holding.user_id, holding.symbol
                )));
            }
        }

        for event in self.reward_events.values() {
            self.require_lock(&event.symbol)?;
            if self.user(event.user_id).is_none() {
                return Err(EngineError::storage(format!(
                    "reward event references unknown user {}",
                    event.user_id
                )));
            }
        }

        for entry in &self.ledger_entries {
            if self.reward_event(entry.reward_event_id).is_none() {
                return Err(EngineError::storage(format!(
                    "ledger entry {} references unknown reward event {}",
                    entry.id, entry.reward_event_id
                )));
            }
        }

        for action in self.corporate_actions.values() {
            for symbol in action.symbols() {
                self.require_lock(&symbol)?;
                if self.stock(&symbol).is_none() {
                    return Err(EngineError::storage(format!(
                        "corporate action {} references unknown stock {}",
                        action.id, symbol
                    )));
                }
            }
        }

        Ok(())
    }

    fn require_lock(&self, symbol: &str) -> Result<(), EngineError> {
        if self.is_locked(symbol) {
            Ok(())
        } else {
            Err(EngineError::storage(format!(
                "write to {symbol} without holding its lock"
            )))
        }
    }

    /// Claim every staged idempotency key, releasing earlier claims if a
    /// later one is taken
    fn claim_idempotency_keys(&self, window_start: DateTime<Utc>) -> Result<(), EngineError> {
        let mut claimed: Vec<&str> = Vec::new();

        for (key, reward_event_id) in &self.idempotency_claims {
            let record = IdempotencyRecord {
                reward_event_id: *reward_event_id,
                claimed_at: self.now,
            };

            let conflict = match self.db.idempotency_keys.entry(key.clone()) {
                Entry::Occupied(mut existing) => {
                    if existing.get().claimed_at > window_start {
                        Some(existing.get().reward_event_id)
                    } else {
                        existing.insert(record);
                        None
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    None
                }
            };

            if let Some(owner) = conflict {
                for key in claimed {
                    self.db.idempotency_keys.remove(key);
                }
                return Err(EngineError::IdempotencyKeyReused {
                    key: key.clone(),
                    reward_event: owner,
                });
            }
            claimed.push(key);
        }

        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(
                symbols = ?self.locked,
                staged_events = self.reward_events.len(),
                staged_entries = self.ledger_entries.len(),
                "unit of work rolled back"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AccountClass, ActionStatus, CorporateActionKind, EntryDirection, FeeType, RewardKind,
    };
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn seeded() -> Database {
        let db = Database::new();
        db.insert_stock(Stock::new("ABC", "Abc Ltd", dec!(100)));
        db.insert_stock(Stock::new("XYZ", "Xyz Ltd", dec!(50)));
        db.insert_user(User::new(1, "Asha"));
        db
    }

    fn new_event(symbol: &str, key: Option<&str>) -> NewRewardEvent {
        NewRewardEvent {
            user_id: 1,
            symbol: symbol.to_string(),
            quantity: dec!(10),
            unit_price: dec!(100),
            total_value: dec!(1000),
            kind: RewardKind::Issuance,
            description: String::new(),
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_staged_writes_are_visible_inside_the_unit_only() {
        let db = seeded();
        let now = Utc::now();
        let mut unit = db.begin(&["ABC"], now).await;

        let mut holding = UserHolding::new(1, "ABC", now);
        holding.quantity = dec!(3);
        unit.put_holding(holding);

        assert_eq!(unit.holding(1, "ABC").unwrap().quantity, dec!(3));
        assert!(db.holding(1, "ABC").is_none());

        unit.commit(now - Duration::hours(1)).unwrap();
        assert_eq!(db.holding(1, "ABC").unwrap().quantity, dec!(3));
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_everything() {
        let db = seeded();
        let now = Utc::now();
        {
            let mut unit = db.begin(&["ABC"], now).await;
            let event = unit.insert_reward_event(new_event("ABC", Some("k")));
            unit.append_ledger_entries(
                event.id,
                vec![NewLedgerEntry {
                    user_id: 1,
                    direction: EntryDirection::Debit,
                    account: AccountClass::StockUnits,
                    symbol: Some("ABC".to_string()),
                    quantity: Some(dec!(10)),
                    amount: None,
                    description: String::new(),
                }],
            );
        }

        assert!(db.reward_events().is_empty());
        assert_eq!(db.ledger_entry_count(), 0);
        assert!(db.idempotency_keys.is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejects_writes_to_unlocked_stock() {
        let db = seeded();
        let now = Utc::now();
        let mut unit = db.begin(&["ABC"], now).await;
        unit.put_holding(UserHolding::new(1, "XYZ", now));

        let result = unit.commit(now - Duration::hours(1));
        assert!(matches!(result, Err(EngineError::Storage { .. })));
        assert!(db.holding(1, "XYZ").is_none());
    }

    #[tokio::test]
    async fn test_commit_rejects_holding_for_unknown_user() {
        let db = seeded();
        let now = Utc::now();
        let mut unit = db.begin(&["ABC"], now).await;
        unit.put_holding(UserHolding::new(42, "ABC", now));

        let result = unit.commit(now - Duration::hours(1));
        assert_eq!(result.unwrap_err().kind(), crate::types::ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_commit_rejects_orphan_ledger_entry() {
        let db = seeded();
        let now = Utc::now();
        let mut unit = db.begin(&["ABC"], now).await;
        unit.append_ledger_entries(
            99,
            vec![NewLedgerEntry {
                user_id: 1,
                direction: EntryDirection::Credit,
                account: AccountClass::Cash,
                symbol: None,
                quantity: None,
                amount: Some(dec!(1)),
                description: String::new(),
            }],
        );

        assert!(unit.commit(now - Duration::hours(1)).is_err());
        assert_eq!(db.ledger_entry_count(), 0);
    }

    #[tokio::test]
    async fn test_second_claim_of_fresh_key_fails_at_commit() {
        let db = seeded();
        let now = Utc::now();

        let mut first = db.begin(&["ABC"], now).await;
        let owner = first.insert_reward_event(new_event("ABC", Some("retry-1")));
        first.commit(now - Duration::hours(1)).unwrap();

        let mut second = db.begin(&["XYZ"], now).await;
        second.insert_reward_event(new_event("XYZ", Some("retry-1")));
        let result = second.commit(now - Duration::hours(1));

        assert_eq!(
            result,
            Err(EngineError::IdempotencyKeyReused {
                key: "retry-1".to_string(),
                reward_event: owner.id,
            })
        );
        assert_eq!(db.reward_events().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_key_can_be_claimed_again() {
        let db = seeded();
        let then = Utc::now() - Duration::hours(2);
        let now = Utc::now();

        let mut first = db.begin(&["ABC"], then).await;
        first.insert_reward_event(new_event("ABC", Some("retry-1")));
        first.commit(then - Duration::hours(1)).unwrap();

        let mut second = db.begin(&["ABC"], now).await;
        let event = second.insert_reward_event(new_event("ABC", Some("retry-1")));
        second.commit(now - Duration::hours(1)).unwrap();

        assert_eq!(db.idempotency_keys.get("retry-1").unwrap().reward_event_id, event.id);
    }

    #[tokio::test]
    async fn test_recent_reward_lookup_respects_window() {
        let db = seeded();
        let now = Utc::now();
        let mut unit = db.begin(&["ABC"], now).await;
        unit.insert_reward_event(new_event("ABC", None));
        unit.commit(now - Duration::hours(1)).unwrap();

        let unit = db.begin(&["ABC"], now).await;
        assert!(unit.has_recent_reward(1, "ABC", dec!(10), now - Duration::minutes(5)));
        assert!(!unit.has_recent_reward(1, "ABC", dec!(11), now - Duration::minutes(5)));
        assert!(!unit.has_recent_reward(1, "ABC", dec!(10), now + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_due_corporate_action_ignores_future_and_completed() {
        let db = seeded();
        let now = Utc::now();
        let today = now.date_naive();

        let mut unit = db.begin(&["ABC"], now).await;
        let template = CorporateAction {
            id: 0,
            symbol: "ABC".to_string(),
            kind: CorporateActionKind::Split { ratio: dec!(2) },
            effective_date: today + Duration::days(3),
            status: ActionStatus::Pending,
            description: String::new(),
            created_at: now,
            processed_at: None,
        };
        unit.insert_corporate_action(template.clone());
        let mut done = template.clone();
        done.effective_date = today;
        done.status = ActionStatus::Completed;
        unit.insert_corporate_action(done);
        assert!(unit.due_corporate_action("ABC", today).is_none());

        let mut due = template;
        due.effective_date = today;
        let due = unit.insert_corporate_action(due);
        assert_eq!(unit.due_corporate_action("ABC", today).unwrap().id, due.id);
    }

    #[tokio::test]
    async fn test_active_fees_skip_inactive_rows() {
        let db = seeded();
        db.insert_fee(FeeConfiguration::new(FeeType::Brokerage, dec!(0.0005)));
        let mut stt = FeeConfiguration::new(FeeType::TransactionTax, dec!(0.001));
        stt.is_active = false;
        db.insert_fee(stt);

        let unit = db.begin(&["ABC"], Utc::now()).await;
        let fees = unit.active_fees();
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].fee_type, FeeType::Brokerage);
    }
}
