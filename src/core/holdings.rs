//! Holdings ledger
//!
//! Maintains the per-(user, stock) position and its volume-weighted average
//! cost. Every function here works on rows read through the caller's unit of
//! work and stages the result back into it, so a failure anywhere in the
//! surrounding operation leaves no trace.
//!
//! Positions are created on the first credit and never removed; reversals,
//! mergers and delistings only shrink the quantity, down to zero at most.

use crate::store::UnitOfWork;
use crate::types::{EngineError, UserHolding, UserId};
use rust_decimal::Decimal;

/// Average cost after adding `added_quantity` units bought at `unit_cost`
///
/// # Arguments
///
/// * `quantity` - Units already held
/// * `average_cost` - Current average cost of those units
/// * `added_quantity` - Units being added, must be positive
/// * `unit_cost` - Cost per added unit
///
/// # Returns
///
/// `(new_quantity, new_average_cost)`; when nothing was held before the new
/// average is simply `unit_cost`.
///
/// # Errors
///
/// Returns `ArithmeticOverflow` if the cost basis does not fit a `Decimal`.
pub fn weighted_average(
    quantity: Decimal,
    average_cost: Decimal,
    added_quantity: Decimal,
    unit_cost: Decimal,
) -> Result<(Decimal, Decimal), EngineError> {
    let overflow = || EngineError::arithmetic_overflow("weighted average");

    let new_quantity = quantity.checked_add(added_quantity).ok_or_else(overflow)?;
    if quantity.is_zero() {
        return Ok((new_quantity, unit_cost));
    }

    let held_cost = quantity.checked_mul(average_cost).ok_or_else(overflow)?;
    let added_cost = added_quantity.checked_mul(unit_cost).ok_or_else(overflow)?;
    let new_average = held_cost
        .checked_add(added_cost)
        .and_then(|basis| basis.checked_div(new_quantity))
        .ok_or_else(overflow)?;

    Ok((new_quantity, new_average))
}

/// Add units to a user's position, creating it if needed
pub fn credit(
    unit: &mut UnitOfWork<'_>,
    user_id: UserId,
    symbol: &str,
    quantity: Decimal,
    unit_cost: Decimal,
) -> Result<UserHolding, EngineError> {
    let now = unit.now();
    let mut holding = unit
        .holding(user_id, symbol)
        .unwrap_or_else(|| UserHolding::new(user_id, symbol, now));

    let (new_quantity, new_average) =
        weighted_average(holding.quantity, holding.average_cost, quantity, unit_cost)?;
    holding.quantity = new_quantity;
    holding.average_cost = new_average;
    holding.updated_at = now;

    unit.put_holding(holding.clone());
    Ok(holding)
}

/// Remove units from a user's position, leaving the average cost unchanged
///
/// # Errors
///
/// Returns `InsufficientHoldings` if the position holds fewer than `quantity`
/// units. A missing position counts as holding zero.
pub fn debit(
    unit: &mut UnitOfWork<'_>,
    user_id: UserId,
    symbol: &str,
    quantity: Decimal,
) -> Result<UserHolding, EngineError> {
    let existing = unit.holding(user_id, symbol);
    let held = existing
        .as_ref()
        .map(|holding| holding.quantity)
        .unwrap_or(Decimal::ZERO);

    let mut holding = match existing {
        Some(holding) if held >= quantity => holding,
        _ => {
            return Err(EngineError::insufficient_holdings(
                user_id, symbol, held, quantity,
            ))
        }
    };

    holding.quantity = holding
        .quantity
        .checked_sub(quantity)
        .ok_or_else(|| EngineError::arithmetic_overflow("holding debit"))?;
    holding.updated_at = unit.now();

    unit.put_holding(holding.clone());
    Ok(holding)
}

/// Number of users holding a positive quantity of `symbol`
pub fn holder_count(unit: &UnitOfWork<'_>, symbol: &str) -> usize {
    unit.holdings_for_stock(symbol)
        .iter()
        .filter(|holding| holding.is_open())
        .count()
}

/// Multiply every open position by `ratio` and divide its average cost by it
///
/// Returns the number of positions rewritten.
pub fn split(unit: &mut UnitOfWork<'_>, symbol: &str, ratio: Decimal) -> Result<usize, EngineError> {
    let now = unit.now();
    let mut rewritten = 0;

    for mut holding in unit.holdings_for_stock(symbol) {
        if !holding.is_open() {
            continue;
        }
        holding.quantity = holding
            .quantity
            .checked_mul(ratio)
            .ok_or_else(|| EngineError::arithmetic_overflow("split quantity"))?;
        holding.average_cost = holding
            .average_cost
            .checked_div(ratio)
            .ok_or_else(|| EngineError::arithmetic_overflow("split average cost"))?;
        holding.updated_at = now;
        unit.put_holding(holding);
        rewritten += 1;
    }

    Ok(rewritten)
}

/// Convert every open `source` position into `target` units at `ratio`
///
/// Each holder receives `quantity * ratio` target units at a cost of
/// `average_cost / ratio` per unit, merged into any target position they
/// already had. All source positions end at zero.
///
/// Returns the number of positions converted.
pub fn merge(
    unit: &mut UnitOfWork<'_>,
    source: &str,
    target: &str,
    ratio: Decimal,
) -> Result<usize, EngineError> {
    let mut converted = 0;

    for holding in unit.holdings_for_stock(source) {
        if !holding.is_open() {
            continue;
        }
        let target_quantity = holding
            .quantity
            .checked_mul(ratio)
            .ok_or_else(|| EngineError::arithmetic_overflow("merger quantity"))?;
        let target_cost = holding
            .average_cost
            .checked_div(ratio)
            .ok_or_else(|| EngineError::arithmetic_overflow("merger average cost"))?;

        credit(unit, holding.user_id, target, target_quantity, target_cost)?;
        converted += 1;
    }

    zero_out(unit, source);
    Ok(converted)
}

/// Set every open position in `symbol` to zero units
///
/// Returns the number of positions closed.
pub fn zero_out(unit: &mut UnitOfWork<'_>, symbol: &str) -> usize {
    let now = unit.now();
    let mut closed = 0;

    for mut holding in unit.holdings_for_stock(symbol) {
        if !holding.is_open() {
            continue;
        }
        holding.quantity = Decimal::ZERO;
        holding.updated_at = now;
        unit.put_holding(holding);
        closed += 1;
    }

    closed
}
