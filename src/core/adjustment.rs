//! Reward adjustment
//!
//! Reverses all or part of a prior issuance. The reversal is valued at the
//! original issuance price, books a stock credit and a cash debit, takes the
//! units back out of the holding and marks the original as reversed. Fees
//! charged on the original issuance are not recovered.

use crate::core::engine::{RewardsEngine, IDEMPOTENCY_WINDOW};
use crate::core::fee_policy::FeeBreakdown;
use crate::core::{holdings, journal};
use crate::types::{
    AdjustRewardRequest, AdjustmentType, EngineError, NewRewardEvent, RewardEvent, RewardKind,
    RewardStatus,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

impl RewardsEngine {
    /// Refund or partially refund a prior issuance
    ///
    /// # Arguments
    ///
    /// * `request` - Original event id, adjustment type, quantity and reason
    ///
    /// # Returns
    ///
    /// * `Ok(RewardEvent)` - The committed ADJUSTMENT event
    /// * `Err(EngineError)` - The first failed precondition; nothing is written
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if the quantity is not positive
    /// - `RewardEventNotFound` if the original does not exist
    /// - `AdjustmentOfAdjustment` if the original is itself an adjustment
    /// - `RefundQuantityMismatch` if a full refund does not match the original quantity
    /// - `PartialRefundTooLarge` if a partial refund is not below the original quantity
    /// - `InsufficientHoldings` if the user no longer holds enough units
    pub async fn adjust_reward(&self, request: AdjustRewardRequest) -> Result<RewardEvent, EngineError> {
        let result = self.try_adjust_reward(&request).await;
        match &result {
            Ok(event) => info!(
                reward_event = event.id,
                original = request.reward_event_id,
                adjustment = %request.adjustment_type,
                quantity = %event.quantity,
                "reward adjusted"
            ),
            Err(error) => warn!(
                original = request.reward_event_id,
                adjustment = %request.adjustment_type,
                quantity = %request.quantity,
                %error,
                "adjustment rejected"
            ),
        }
        result
    }

    async fn try_adjust_reward(&self, request: &AdjustRewardRequest) -> Result<RewardEvent, EngineError> {
        if request.quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity {
                quantity: request.quantity,
            });
        }

        let not_found = EngineError::RewardEventNotFound {
            reward_event: request.reward_event_id,
        };

        // The stock of an event never changes, so it is safe to learn which
        // lock to take before taking it.
        let symbol = self
            .db
            .reward_event(request.reward_event_id)
            .map(|event| event.symbol)
            .ok_or_else(|| not_found.clone())?;

        let now = self.now();
        let mut unit = self.db.begin(&[symbol.as_str()], now).await;

        let original = unit
            .reward_event(request.reward_event_id)
            .ok_or(not_found)?;
        if original.kind != RewardKind::Issuance {
            return Err(EngineError::AdjustmentOfAdjustment {
                reward_event: original.id,
            });
        }

        match request.adjustment_type {
            AdjustmentType::Refund if request.quantity != original.quantity => {
                return Err(EngineError::RefundQuantityMismatch {
                    reward_event: original.id,
                    original: original.quantity,
                    requested: request.quantity,
                });
            }
            AdjustmentType::PartialRefund if request.quantity >= original.quantity => {
                return Err(EngineError::PartialRefundTooLarge {
                    reward_event: original.id,
                    original: original.quantity,
                    requested: request.quantity,
                });
            }
            AdjustmentType::Refund | AdjustmentType::PartialRefund => {}
        }

        let held = unit
            .holding(original.user_id, &original.symbol)
            .map(|holding| holding.quantity)
            .unwrap_or(Decimal::ZERO);
        if held < request.quantity {
            return Err(EngineError::insufficient_holdings(
                original.user_id,
                &original.symbol,
                held,
                request.quantity,
            ));
        }

        let total_value = request
            .quantity
            .checked_mul(original.unit_price)
            .ok_or_else(|| EngineError::arithmetic_overflow("adjustment value"))?;

        let event = unit.insert_reward_event(NewRewardEvent {
            user_id: original.user_id,
            symbol: original.symbol.clone(),
            quantity: request.quantity,
            unit_price: original.unit_price,
            total_value,
            kind: RewardKind::Adjustment,
            description: format!(
                "{} for reward #{}: {}",
                request.adjustment_type, original.id, request.reason
            ),
            idempotency_key: None,
        });

        let entries = unit.append_ledger_entries(event.id, journal::adjustment_entries(&event));
        journal::ensure_balanced(&event, &FeeBreakdown::default(), &entries)?;

        holdings::debit(&mut unit, original.user_id, &original.symbol, request.quantity)?;
        unit.set_reward_status(
            original.id,
            next_status(original.status, request.adjustment_type),
        )?;

        unit.commit(now - IDEMPOTENCY_WINDOW)?;
        Ok(event)
    }
}

/// Status of an issuance after another adjustment against it
///
/// A fully reversed issuance stays reversed.
fn next_status(current: RewardStatus, adjustment: AdjustmentType) -> RewardStatus {
    match current {
        RewardStatus::Reversed => RewardStatus::Reversed,
        RewardStatus::Active | RewardStatus::PartiallyReversed => adjustment.resulting_status(),
    }
}
