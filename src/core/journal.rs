//! Double-entry journal
//!
//! Builds the debit and credit lines for reward events and checks that they
//! balance before they are staged.
//!
//! Stock-unit lines carry a symbol and quantity; cash-class lines carry an
//! amount. Quantities and amounts are always non-negative, the direction gives
//! the sign:
//!
//! | Event      | Lines                                                         |
//! |------------|---------------------------------------------------------------|
//! | Issuance   | DEBIT stock units; CREDIT cash, brokerage, tax, tax on fee    |
//! | Adjustment | CREDIT stock units; DEBIT cash                                |

use crate::core::fee_policy::FeeBreakdown;
use crate::types::{
    AccountClass, EngineError, EntryDirection, LedgerEntry, NewLedgerEntry, RewardEvent,
    RewardKind,
};
use rust_decimal::Decimal;

/// Signed sums over the lines of one event
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JournalTotals {
    /// Net stock units moved to the user
    pub units: Decimal,

    /// Net cash-class amount paid out on the user's behalf
    pub cash: Decimal,
}

impl JournalTotals {
    /// Sum `entries`
    pub fn of(entries: &[LedgerEntry]) -> Result<Self, EngineError> {
        let overflow = || EngineError::arithmetic_overflow("journal totals");
        let mut totals = JournalTotals::default();

        for entry in entries {
            if entry.account.is_cash_class() {
                totals.cash = totals
                    .cash
                    .checked_add(entry.signed_amount())
                    .ok_or_else(overflow)?;
            } else {
                totals.units = totals
                    .units
                    .checked_add(entry.signed_units())
                    .ok_or_else(overflow)?;
            }
        }

        Ok(totals)
    }
}

/// Lines for a reward issuance
pub fn issuance_entries(event: &RewardEvent, fees: &FeeBreakdown) -> Vec<NewLedgerEntry> {
    vec![
        stock_line(event, EntryDirection::Debit, "Stock reward credited"),
        cash_line(
            event,
            EntryDirection::Credit,
            AccountClass::Cash,
            event.total_value,
            "Cash outflow for stock purchase",
        ),
        cash_line(
            event,
            EntryDirection::Credit,
            AccountClass::BrokerageFee,
            fees.brokerage,
            "Brokerage fee",
        ),
        cash_line(
            event,
            EntryDirection::Credit,
            AccountClass::TransactionTax,
            fees.transaction_tax,
            "Securities transaction tax",
        ),
        cash_line(
            event,
            EntryDirection::Credit,
            AccountClass::TaxOnFee,
            fees.tax_on_fee,
            "Tax on brokerage",
        ),
    ]
}

/// Lines for a refund or partial refund
///
/// Fees charged on the original issuance are not recovered.
pub fn adjustment_entries(event: &RewardEvent) -> Vec<NewLedgerEntry> {
    vec![
        stock_line(event, EntryDirection::Credit, &event.description),
        cash_line(
            event,
            EntryDirection::Debit,
            AccountClass::Cash,
            event.total_value,
            &event.description,
        ),
    ]
}

/// Check that the staged lines of `event` balance
///
/// Units must net to the event's signed quantity. Cash-class lines must net
/// to the total value plus every fee for an issuance and to minus the total
/// value for an adjustment. The expected cash is summed in line order, so
/// rounding at full `Decimal` precision matches the journal exactly.
///
/// # Errors
///
/// Returns a `Storage` error naming the event if the lines do not balance.
pub fn ensure_balanced(
    event: &RewardEvent,
    fees: &FeeBreakdown,
    entries: &[LedgerEntry],
) -> Result<(), EngineError> {
    let totals = JournalTotals::of(entries)?;

    let (expected_units, expected_cash) = match event.kind {
        RewardKind::Issuance => (
            event.quantity,
            [fees.brokerage, fees.transaction_tax, fees.tax_on_fee]
                .into_iter()
                .try_fold(event.total_value, |sum, fee| sum.checked_add(fee))
                .ok_or_else(|| EngineError::arithmetic_overflow("journal totals"))?,
        ),
        RewardKind::Adjustment => (-event.quantity, -event.total_value),
    };

    if totals.units != expected_units || totals.cash != expected_cash {
        return Err(EngineError::storage(format!(
            "journal for reward event {} does not balance: units {} (expected {}), cash {} (expected {})",
            event.id, totals.units, expected_units, totals.cash, expected_cash
        )));
    }

    Ok(())
}

fn stock_line(event: &RewardEvent, direction: EntryDirection, description: &str) -> NewLedgerEntry {
    NewLedgerEntry {
        user_id: event.user_id,
        direction,
        account: AccountClass::StockUnits,
        symbol: Some(event.symbol.clone()),
        quantity: Some(event.quantity),
        amount: None,
        description: description.to_string(),
    }
}

fn cash_line(
    event: &RewardEvent,
    direction: EntryDirection,
    account: AccountClass,
    amount: Decimal,
    description: &str,
) -> NewLedgerEntry {
    NewLedgerEntry {
        user_id: event.user_id,
        direction,
        account,
        symbol: None,
        quantity: None,
        amount: Some(amount),
        description: description.to_string(),
    }
}
