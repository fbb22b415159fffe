//! Fee policy provider
//!
//! Fee rates are read from the store inside the caller's unit of work and are
//! never cached. A fee type with no active configuration charges nothing.

use crate::store::UnitOfWork;
use crate::types::{EngineError, FeeConfiguration, FeeType};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Active fee rates at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeSchedule {
    rates: BTreeMap<FeeType, Decimal>,
}

/// Fees charged on one issuance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeeBreakdown {
    pub brokerage: Decimal,
    pub transaction_tax: Decimal,
    pub tax_on_fee: Decimal,
}

impl FeeBreakdown {
    /// Sum of every fee
    pub fn total(&self) -> Result<Decimal, EngineError> {
        self.brokerage
            .checked_add(self.transaction_tax)
            .and_then(|sum| sum.checked_add(self.tax_on_fee))
            .ok_or_else(|| EngineError::arithmetic_overflow("fee total"))
    }
}

impl FeeSchedule {
    /// Build a schedule from configuration rows, skipping inactive ones
    pub fn from_configurations<'a, I>(configurations: I) -> Self
    where
        I: IntoIterator<Item = &'a FeeConfiguration>,
    {
        let rates = configurations
            .into_iter()
            .filter(|fee| fee.is_active)
            .map(|fee| (fee.fee_type, fee.rate))
            .collect();
        FeeSchedule { rates }
    }

    /// Rate for `fee_type`, zero when not configured
    pub fn rate(&self, fee_type: FeeType) -> Decimal {
        self.rates.get(&fee_type).copied().unwrap_or(Decimal::ZERO)
    }

    /// Compute the fees on a purchase of `total_value`
    ///
    /// Brokerage and transaction tax are charged on the purchase value; tax on
    /// fee is charged on the brokerage amount.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if any product does not fit a `Decimal`.
    pub fn charges_on(&self, total_value: Decimal) -> Result<FeeBreakdown, EngineError> {
        let brokerage = total_value
            .checked_mul(self.rate(FeeType::Brokerage))
            .ok_or_else(|| EngineError::arithmetic_overflow("brokerage fee"))?;
        let transaction_tax = total_value
            .checked_mul(self.rate(FeeType::TransactionTax))
            .ok_or_else(|| EngineError::arithmetic_overflow("transaction tax"))?;
        let tax_on_fee = brokerage
            .checked_mul(self.rate(FeeType::TaxOnFee))
            .ok_or_else(|| EngineError::arithmetic_overflow("tax on fee"))?;

        Ok(FeeBreakdown {
            brokerage,
            transaction_tax,
            tax_on_fee,
        })
    }
}

/// Read the active fee schedule inside `unit`
pub fn current_fees(unit: &UnitOfWork<'_>) -> FeeSchedule {
    FeeSchedule::from_configurations(&unit.active_fees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn schedule() -> FeeSchedule {
        FeeSchedule::from_configurations(&[
            FeeConfiguration::new(FeeType::Brokerage, dec!(0.0005)),
            FeeConfiguration::new(FeeType::TransactionTax, dec!(0.001)),
            FeeConfiguration::new(FeeType::TaxOnFee, dec!(0.18)),
        ])
    }

    #[test]
    fn test_missing_fee_type_charges_nothing() {
        let schedule = FeeSchedule::from_configurations(&[FeeConfiguration::new(
            FeeType::Brokerage,
            dec!(0.0005),
        )]);
        assert_eq!(schedule.rate(FeeType::TaxOnFee), Decimal::ZERO);

        let fees = schedule.charges_on(dec!(1000)).unwrap();
        assert_eq!(fees.brokerage, dec!(0.5));
        assert_eq!(fees.transaction_tax, Decimal::ZERO);
        assert_eq!(fees.tax_on_fee, Decimal::ZERO);
    }

    #[test]
    fn test_inactive_rows_are_ignored() {
        let mut inactive = FeeConfiguration::new(FeeType::TransactionTax, dec!(0.001));
        inactive.is_active = false;
        let schedule = FeeSchedule::from_configurations(&[inactive]);
        assert_eq!(schedule.rate(FeeType::TransactionTax), Decimal::ZERO);
    }

    #[rstest]
    #[case::thousand(dec!(1000), dec!(0.5), dec!(1), dec!(0.09))]
    #[case::five_hundred(dec!(500), dec!(0.25), dec!(0.5), dec!(0.045))]
    #[case::zero(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)]
    fn test_charges_on(
        #[case] total: Decimal,
        #[case] brokerage: Decimal,
        #[case] tax: Decimal,
        #[case] tax_on_fee: Decimal,
    ) {
        let fees = schedule().charges_on(total).unwrap();
        assert_eq!(fees.brokerage, brokerage);
        assert_eq!(fees.transaction_tax, tax);
        assert_eq!(fees.tax_on_fee, tax_on_fee);
        assert_eq!(fees.total().unwrap(), brokerage + tax + tax_on_fee);
    }

    #[test]
    fn test_overflow_is_reported() {
        let schedule = FeeSchedule::from_configurations(&[FeeConfiguration::new(
            FeeType::Brokerage,
            Decimal::MAX,
        )]);
        let result = schedule.charges_on(Decimal::MAX);
        assert!(matches!(result, Err(EngineError::ArithmeticOverflow { .. })));
    }
}
