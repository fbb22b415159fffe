//! Double-entry journal lines

use super::reward::RewardEventId;
use super::stock::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger entry identifier
pub type LedgerEntryId = u64;

/// Side of a journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryDirection {
    Debit,
    Credit,
}

/// Account a journal line is booked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountClass {
    /// Units of the rewarded stock
    StockUnits,
    /// Purchase cost of the units
    Cash,
    BrokerageFee,
    TransactionTax,
    /// Tax charged on the brokerage fee
    TaxOnFee,
}

impl AccountClass {
    /// True for every currency-denominated account
    pub fn is_cash_class(self) -> bool {
        !matches!(self, AccountClass::StockUnits)
    }
}

/// A single debit or credit line belonging to one reward event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub reward_event_id: RewardEventId,
    pub user_id: UserId,
    pub direction: EntryDirection,
    pub account: AccountClass,

    /// Stock the units belong to (stock-unit lines only)
    pub symbol: Option<String>,

    /// Units moved (stock-unit lines only), always positive
    pub quantity: Option<Decimal>,

    /// Money moved (cash-class lines only), never negative
    pub amount: Option<Decimal>,

    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Units with sign: debits add to the user's position, credits remove
    pub fn signed_units(&self) -> Decimal {
        let units = self.quantity.unwrap_or(Decimal::ZERO);
        match self.direction {
            EntryDirection::Debit => units,
            EntryDirection::Credit => -units,
        }
    }

    /// Amount with sign: credits are cash paid out for the user, debits cash recovered
    pub fn signed_amount(&self) -> Decimal {
        let amount = self.amount.unwrap_or(Decimal::ZERO);
        match self.direction {
            EntryDirection::Credit => amount,
            EntryDirection::Debit => -amount,
        }
    }
}

/// Journal line before the store assigns its identifier
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub user_id: UserId,
    pub direction: EntryDirection,
    pub account: AccountClass,
    pub symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub description: String,
}
