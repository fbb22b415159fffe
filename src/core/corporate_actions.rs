//! Corporate actions
//!
//! Two-phase state machine for splits, mergers and delistings:
//!
//! ```text
//! declare ──► PENDING ──process──► COMPLETED
//! ```
//!
//! Declaring only records the action. Processing rewrites every holding of
//! the source stock (and the merger target) and the stock rows themselves in
//! one unit of work, which holds the locks of both stocks, so no issuance on
//! either stock can interleave with it. Corporate actions write no journal
//! lines.

use crate::core::engine::{RewardsEngine, IDEMPOTENCY_WINDOW};
use crate::core::holdings;
use crate::store::UnitOfWork;
use crate::types::{
    ActionStatus, CorporateAction, CorporateActionId, CorporateActionKind, DeclareActionRequest,
    DeclaredAction, EngineError, Stock,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

impl RewardsEngine {
    /// Record a pending corporate action
    ///
    /// # Arguments
    ///
    /// * `request` - Source stock, action kind with its parameters, effective date and description
    ///
    /// # Returns
    ///
    /// * `Ok(DeclaredAction)` - The PENDING action and the number of users currently holding the source
    /// * `Err(EngineError)` - Nothing is written
    ///
    /// # Errors
    ///
    /// - `StockNotFound` / `StockDelisted` for the source or the merger target
    /// - `InvalidRatio` if a split or merger ratio is not positive
    /// - `MissingMergerTarget` if a merger names no target
    /// - `SelfMerger` if a merger targets its own source
    pub async fn declare_corporate_action(
        &self,
        request: DeclareActionRequest,
    ) -> Result<DeclaredAction, EngineError> {
        let result = self.try_declare(&request).await;
        match &result {
            Ok(declared) => info!(
                action = declared.action.id,
                symbol = %declared.action.symbol,
                kind = %declared.action.kind,
                effective_date = %declared.action.effective_date,
                affected_users = declared.affected_users,
                "corporate action declared"
            ),
            Err(error) => warn!(
                symbol = %request.symbol,
                kind = %request.kind,
                %error,
                "corporate action rejected"
            ),
        }
        result
    }

    async fn try_declare(&self, request: &DeclareActionRequest) -> Result<DeclaredAction, EngineError> {
        let mut symbols = vec![request.symbol.as_str()];
        if let Some(target) = request.kind.target() {
            symbols.push(target);
        }

        let now = self.now();
        let mut unit = self.db.begin(&symbols, now).await;

        require_active(&unit, &request.symbol)?;
        validate_kind(&request.symbol, &request.kind)?;
        if let Some(target) = request.kind.target() {
            require_active(&unit, target)?;
        }

        let action = unit.insert_corporate_action(CorporateAction {
            id: 0,
            symbol: request.symbol.clone(),
            kind: request.kind.clone(),
            effective_date: request.effective_date,
            status: ActionStatus::Pending,
            description: request.description.clone(),
            created_at: now,
            processed_at: None,
        });
        let affected_users = holdings::holder_count(&unit, &request.symbol);

        unit.commit(now - IDEMPOTENCY_WINDOW)?;
        Ok(DeclaredAction {
            action,
            affected_users,
        })
    }

    /// Apply a pending corporate action and mark it completed
    ///
    /// - SPLIT: every open holding is multiplied by the ratio and its average
    ///   cost divided by it; the stock price is divided by the ratio
    /// - MERGER: every open holding is converted into target units at the
    ///   ratio, source holdings are zeroed and the source is deactivated
    /// - DELISTING: every open holding is zeroed and the source is deactivated
    ///
    /// # Errors
    ///
    /// - `CorporateActionNotFound` if no such action exists
    /// - `ActionAlreadyCompleted` if it was already processed
    /// - `ArithmeticOverflow` if a rewritten holding does not fit a `Decimal`
    pub async fn process_corporate_action(
        &self,
        action_id: CorporateActionId,
    ) -> Result<CorporateAction, EngineError> {
        let result = self.try_process(action_id).await;
        match &result {
            Ok(action) => info!(
                action = action.id,
                symbol = %action.symbol,
                kind = %action.kind,
                "corporate action processed"
            ),
            Err(error) => warn!(action = action_id, %error, "corporate action processing failed"),
        }
        result
    }

    async fn try_process(&self, action_id: CorporateActionId) -> Result<CorporateAction, EngineError> {
        let not_found = EngineError::CorporateActionNotFound { action: action_id };

        // Source and target are fixed at declaration, so they name the locks
        let symbols = self
            .db
            .corporate_action(action_id)
            .map(|action| action.symbols())
            .ok_or_else(|| not_found.clone())?;

        let now = self.now();
        let mut unit = self.db.begin(&symbols, now).await;

        let mut action = unit.corporate_action(action_id).ok_or(not_found)?;
        if action.status == ActionStatus::Completed {
            return Err(EngineError::ActionAlreadyCompleted { action: action.id });
        }

        let mut source = unit
            .stock(&action.symbol)
            .ok_or_else(|| EngineError::stock_not_found(&action.symbol))?;

        match &action.kind {
            CorporateActionKind::Split { ratio } => {
                let rewritten = holdings::split(&mut unit, &source.symbol, *ratio)?;
                source.current_price = source
                    .current_price
                    .checked_div(*ratio)
                    .ok_or_else(|| EngineError::arithmetic_overflow("split price"))?;
                info!(action = action.id, holdings = rewritten, ratio = %ratio, "split applied");
            }
            CorporateActionKind::Merger { target, ratio } => {
                if unit.stock(target).is_none() {
                    return Err(EngineError::stock_not_found(target));
                }
                let converted = holdings::merge(&mut unit, &source.symbol, target, *ratio)?;
                source.is_active = false;
                info!(action = action.id, holdings = converted, target = %target, "merger applied");
            }
            CorporateActionKind::Delisting => {
                let closed = holdings::zero_out(&mut unit, &source.symbol);
                source.is_active = false;
                info!(action = action.id, holdings = closed, "delisting applied");
            }
        }
        unit.put_stock(source);

        action.status = ActionStatus::Completed;
        action.processed_at = Some(now);
        unit.put_corporate_action(action.clone());

        unit.commit(now - IDEMPOTENCY_WINDOW)?;
        Ok(action)
    }
}

fn require_active(unit: &UnitOfWork<'_>, symbol: &str) -> Result<Stock, EngineError> {
    let stock = unit
        .stock(symbol)
        .ok_or_else(|| EngineError::stock_not_found(symbol))?;
    if !stock.is_active {
        return Err(EngineError::stock_delisted(symbol));
    }
    Ok(stock)
}

fn validate_kind(symbol: &str, kind: &CorporateActionKind) -> Result<(), EngineError> {
    match kind {
        CorporateActionKind::Split { ratio } if *ratio <= Decimal::ZERO => {
            Err(EngineError::invalid_ratio(kind.label(), *ratio))
        }
        CorporateActionKind::Merger { target, .. } if target.trim().is_empty() => {
            Err(EngineError::MissingMergerTarget {
                symbol: symbol.to_string(),
            })
        }
        CorporateActionKind::Merger { target, .. } if target == symbol => {
            Err(EngineError::SelfMerger {
                symbol: symbol.to_string(),
            })
        }
        CorporateActionKind::Merger { ratio, .. } if *ratio <= Decimal::ZERO => {
            Err(EngineError::invalid_ratio(kind.label(), *ratio))
        }
        CorporateActionKind::Split { .. }
        | CorporateActionKind::Merger { .. }
        | CorporateActionKind::Delisting => Ok(()),
    }
}
