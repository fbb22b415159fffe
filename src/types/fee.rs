//! Fee configuration records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee charged on top of a reward's purchase cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeType {
    /// Charged on the purchase value
    Brokerage,

    /// Securities transaction tax, charged on the purchase value
    #[serde(alias = "STT")]
    TransactionTax,

    /// Tax charged on the brokerage fee
    #[serde(alias = "GST")]
    TaxOnFee,
}

/// A configured fee rate
///
/// `rate` is a fraction, so `0.0005` means 0.05%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfiguration {
    pub fee_type: FeeType,
    pub rate: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl FeeConfiguration {
    /// Create an active fee
    pub fn new(fee_type: FeeType, rate: Decimal) -> Self {
        FeeConfiguration {
            fee_type,
            rate,
            description: String::new(),
            is_active: true,
        }
    }
}

fn default_active() -> bool {
    true
}
