//! Thread-safe in-memory data store
//!
//! This module provides the `Database` struct, the single source of truth shared
//! by every engine. Tables are `DashMap`s so that reads and writes on different
//! rows proceed concurrently, and every unit of work additionally holds an
//! exclusive lock per stock it touches.
//!
//! # Locking
//!
//! All rows the engine mutates (holdings, reward events, ledger entries,
//! corporate actions, stock price and status) belong to exactly one stock. A
//! unit of work acquires the locks of every stock it will touch before reading
//! anything, in sorted symbol order, and keeps them until it is committed or
//! dropped. This is the in-memory equivalent of `SELECT ... FOR UPDATE` on the
//! stock row and its holdings.
//!
//! # Seeding
//!
//! Stocks, users and fee configurations are owned by external collaborators.
//! `insert_stock`, `insert_user` and `insert_fee` are their write path and are
//! not part of any unit of work.

use crate::store::unit_of_work::UnitOfWork;
use crate::types::{
    CorporateAction, CorporateActionId, FeeConfiguration, FeeType, HoldingKey, LedgerEntry,
    RewardEvent, RewardEventId, Stock, User, UserHolding, UserId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry of the idempotency index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyRecord {
    /// Reward created under the key
    pub reward_event_id: RewardEventId,

    /// When the key was claimed
    pub claimed_at: DateTime<Utc>,
}

/// Shared transactional data store
#[derive(Debug)]
pub struct Database {
    pub(crate) stocks: DashMap<String, Stock>,
    pub(crate) users: DashMap<UserId, User>,
    pub(crate) fees: DashMap<FeeType, FeeConfiguration>,
    pub(crate) holdings: DashMap<HoldingKey, UserHolding>,
    pub(crate) reward_events: DashMap<RewardEventId, RewardEvent>,

    /// Journal lines grouped by the reward event they belong to
    pub(crate) ledger_entries: DashMap<RewardEventId, Vec<LedgerEntry>>,

    pub(crate) corporate_actions: DashMap<CorporateActionId, CorporateAction>,

    /// Unique index over idempotency keys
    pub(crate) idempotency_keys: DashMap<String, IdempotencyRecord>,

    /// One lock per stock symbol, created on first use
    stock_locks: DashMap<String, Arc<Mutex<()>>>,

    reward_event_seq: AtomicU64,
    ledger_entry_seq: AtomicU64,
    corporate_action_seq: AtomicU64,
}

impl Database {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            stocks: DashMap::new(),
            users: DashMap::new(),
            fees: DashMap::new(),
            holdings: DashMap::new(),
            reward_events: DashMap::new(),
            ledger_entries: DashMap::new(),
            corporate_actions: DashMap::new(),
            idempotency_keys: DashMap::new(),
            stock_locks: DashMap::new(),
            reward_event_seq: AtomicU64::new(0),
            ledger_entry_seq: AtomicU64::new(0),
            corporate_action_seq: AtomicU64::new(0),
        }
    }

    /// Open a unit of work holding exclusive locks on `symbols`
    ///
    /// Locks are taken in sorted order so that two units touching overlapping
    /// stocks (e.g. a merger and an issuance on its target) cannot deadlock.
    /// Waiting only suspends the calling task.
    pub async fn begin<S: AsRef<str>>(&self, symbols: &[S], now: DateTime<Utc>) -> UnitOfWork<'_> {
        let mut symbols: Vec<String> = symbols.iter().map(|s| s.as_ref().to_string()).collect();
        symbols.sort();
        symbols.dedup();

        let mut guards = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            // Clone the Arc out so no map shard stays locked across the await
            let lock = self
                .stock_locks
                .entry(symbol.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }

        UnitOfWork::new(self, symbols, guards, now)
    }

    pub(crate) fn next_reward_event_id(&self) -> RewardEventId {
        self.reward_event_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn next_ledger_entry_id(&self) -> u64 {
        self.ledger_entry_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn next_corporate_action_id(&self) -> CorporateActionId {
        self.corporate_action_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Insert or replace a stock
    pub fn insert_stock(&self, stock: Stock) {
        self.stocks.insert(stock.symbol.clone(), stock);
    }

    /// Insert or replace a user
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Insert or replace the configuration of one fee type
    pub fn insert_fee(&self, fee: FeeConfiguration) {
        self.fees.insert(fee.fee_type, fee);
    }

    pub fn stock(&self, symbol: &str) -> Option<Stock> {
        self.stocks.get(symbol).map(|stock| stock.clone())
    }

    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.users.get(&user_id).map(|user| user.clone())
    }

    pub fn holding(&self, user_id: UserId, symbol: &str) -> Option<UserHolding> {
        self.holdings
            .get(&(user_id, symbol.to_string()))
            .map(|holding| holding.clone())
    }

    /// All holdings of one user, sorted by symbol
    pub fn holdings_for_user(&self, user_id: UserId) -> Vec<UserHolding> {
        let mut holdings: Vec<UserHolding> = self
            .holdings
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        holdings
    }

    /// Every holding, sorted by user then symbol
    pub fn all_holdings(&self) -> Vec<UserHolding> {
        let mut holdings: Vec<UserHolding> = self
            .holdings
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        holdings.sort_by(|a, b| a.key().cmp(&b.key()));
        holdings
    }

    pub fn reward_event(&self, id: RewardEventId) -> Option<RewardEvent> {
        self.reward_events.get(&id).map(|event| event.clone())
    }

    /// Every reward event, oldest first
    pub fn reward_events(&self) -> Vec<RewardEvent> {
        let mut events: Vec<RewardEvent> = self
            .reward_events
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        events.sort_by_key(|event| event.id);
        events
    }

    /// Journal lines of one reward event, in insertion order
    pub fn ledger_entries_for(&self, id: RewardEventId) -> Vec<LedgerEntry> {
        self.ledger_entries
            .get(&id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Total number of journal lines across all events
    pub fn ledger_entry_count(&self) -> usize {
        self.ledger_entries
            .iter()
            .map(|entry| entry.value().len())
            .sum()
    }

    pub fn corporate_action(&self, id: CorporateActionId) -> Option<CorporateAction> {
        self.corporate_actions.get(&id).map(|action| action.clone())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
