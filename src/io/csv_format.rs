//! CSV format handling for command journals and holdings reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - CommandRecord structure for deserialization
//! - Conversion from command rows to engine commands
//! - Holdings report serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{
    AdjustmentType, Command, CorporateActionKind, DeclareActionRequest, IssueRewardRequest,
    UserHolding, UserId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Decimal places written for quantities and costs in the holdings report
pub const REPORT_PRECISION: u32 = 6;

/// CSV record structure for deserialization
///
/// Matches the journal columns:
/// `op,ref,user,symbol,quantity,target,ratio,effective_date,idempotency_key,description`.
/// Every column but `op` is optional because each operation uses a different
/// subset of them.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CommandRecord {
    pub op: String,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub ratio: Option<String>,
    #[serde(default)]
    pub effective_date: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Convert a CommandRecord to a Command
///
/// This function:
/// - Parses the operation name (case-insensitive)
/// - Checks that the columns the operation needs are present
/// - Parses quantities and ratios into `Decimal` and dates into `NaiveDate`
///
/// Business rules (positive quantities, active stocks, ...) are left to the
/// engine.
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(Command) - Successfully converted command
/// - Err(String) - Error message describing the conversion failure
pub fn convert_command_record(record: CommandRecord) -> Result<Command, String> {
    let op = record.op.trim().to_lowercase();
    let description = non_empty(record.description.clone()).unwrap_or_default();

    match op.as_str() {
        "issue" => {
            let user = record
                .user
                .ok_or_else(|| missing(&op, "user"))?;
            let symbol = require(&op, "symbol", record.symbol.clone())?;
            let quantity = parse_decimal(&op, "quantity", record.quantity.clone())?;

            let mut request = IssueRewardRequest::new(user, symbol, quantity)
                .with_description(description);
            if let Some(key) = non_empty(record.idempotency_key) {
                request = request.with_idempotency_key(key);
            }

            Ok(Command::Issue {
                label: non_empty(record.reference),
                request,
            })
        }
        "refund" | "partial_refund" => {
            let adjustment_type = if op == "refund" {
                AdjustmentType::Refund
            } else {
                AdjustmentType::PartialRefund
            };

            Ok(Command::Adjust {
                reward: require(&op, "ref", record.reference.clone())?,
                adjustment_type,
                quantity: parse_decimal(&op, "quantity", record.quantity.clone())?,
                reason: description,
            })
        }
        "split" | "merger" | "delisting" => {
            let symbol = require(&op, "symbol", record.symbol.clone())?;
            let effective_date = parse_date(&op, record.effective_date.clone())?;

            let kind = match op.as_str() {
                "split" => CorporateActionKind::Split {
                    ratio: parse_decimal(&op, "ratio", record.ratio.clone())?,
                },
                "merger" => CorporateActionKind::Merger {
                    target: non_empty(record.target.clone()).unwrap_or_default(),
                    ratio: parse_decimal(&op, "ratio", record.ratio.clone())?,
                },
                _ => CorporateActionKind::Delisting,
            };

            Ok(Command::Declare {
                label: non_empty(record.reference),
                request: DeclareActionRequest {
                    symbol,
                    kind,
                    effective_date,
                    description,
                },
            })
        }
        "process" => Ok(Command::Process {
            action: require(&op, "ref", record.reference)?,
        }),
        _ => Err(format!("Invalid operation: '{}'", record.op)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing(op: &str, column: &str) -> String {
    format!("'{}' requires a {} value", op, column)
}

fn require(op: &str, column: &str, value: Option<String>) -> Result<String, String> {
    non_empty(value).ok_or_else(|| missing(op, column))
}

fn parse_decimal(op: &str, column: &str, value: Option<String>) -> Result<Decimal, String> {
    let raw = require(op, column, value)?;
    Decimal::from_str(&raw).map_err(|_| format!("Invalid {} '{}' for '{}'", column, raw, op))
}

fn parse_date(op: &str, value: Option<String>) -> Result<NaiveDate, String> {
    let raw = require(op, "effective_date", value)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| format!("Invalid effective_date '{}' for '{}'", raw, op))
}

/// Write holdings to CSV format
///
/// Writes holdings with columns: user, symbol, quantity, average_cost.
/// Holdings are sorted by user then symbol for deterministic output, and
/// zeroed positions are included. Values are rounded to six decimal places.
///
/// # Arguments
///
/// * `holdings` - Slice of holdings to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_holdings_csv(holdings: &[UserHolding], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["user", "symbol", "quantity", "average_cost"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = holdings.to_vec();
    sorted.sort_by(|a, b| a.key().cmp(&b.key()));

    for holding in sorted {
        writer
            .write_record(&[
                holding.user_id.to_string(),
                holding.symbol.clone(),
                format_amount(holding.quantity),
                format_amount(holding.average_cost),
            ])
            .map_err(|e| format!("Failed to write holding record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

fn format_amount(value: Decimal) -> String {
    format!(
        "{:.prec$}",
        value.round_dp(REPORT_PRECISION),
        prec = REPORT_PRECISION as usize
    )
}
