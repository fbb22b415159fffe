//! Reference data loaded before a replay
//!
//! Stocks, users and fee rates are owned outside the engine. A replay reads
//! them from a JSON document:
//!
//! ```json
//! {
//!   "stocks": [{ "symbol": "ABC", "name": "Abc Ltd", "current_price": "100" }],
//!   "users": [{ "id": 1, "name": "Asha" }],
//!   "fees": [{ "fee_type": "BROKERAGE", "rate": "0.0005" }]
//! }
//! ```

use crate::store::Database;
use crate::types::{FeeConfiguration, Stock, User};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Reference data for a replay
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub stocks: Vec<Stock>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub fees: Vec<FeeConfiguration>,
}

impl Seed {
    /// Parse a seed document
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid seed document: {}", e))
    }

    /// Read and parse a seed file
    ///
    /// # Errors
    ///
    /// Returns a message naming the path when the file cannot be read or is
    /// not a valid seed document.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Failed to open seed file '{}': {}", path.display(), e))?;
        Self::from_json(&json).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// Insert every record into the database
    pub fn apply(&self, db: &Database) {
        for stock in &self.stocks {
            db.insert_stock(stock.clone());
        }
        for user in &self.users {
            db.insert_user(user.clone());
        }
        for fee in &self.fees {
            db.insert_fee(fee.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeeType;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SEED: &str = r#"{
        "stocks": [
            { "symbol": "ABC", "name": "Abc Ltd", "exchange": "NSE", "current_price": "100" },
            { "symbol": "OLD", "name": "Old Co", "current_price": "5", "is_active": false }
        ],
        "users": [{ "id": 1, "name": "Asha" }],
        "fees": [
            { "fee_type": "BROKERAGE", "rate": "0.0005" },
            { "fee_type": "STT", "rate": "0.001" },
            { "fee_type": "GST", "rate": "0.18" }
        ]
    }"#;

    #[test]
    fn test_parse_seed_with_defaults_and_aliases() {
        let seed = Seed::from_json(SEED).unwrap();

        assert_eq!(seed.stocks.len(), 2);
        assert!(seed.stocks[0].is_active);
        assert!(!seed.stocks[1].is_active);
        assert_eq!(seed.stocks[0].current_price, dec!(100));
        assert!(seed.users[0].is_active);
        assert_eq!(
            seed.fees.iter().map(|fee| fee.fee_type).collect::<Vec<_>>(),
            vec![FeeType::Brokerage, FeeType::TransactionTax, FeeType::TaxOnFee]
        );
    }

    #[test]
    fn test_apply_populates_database() {
        let db = Database::new();
        Seed::from_json(SEED).unwrap().apply(&db);

        assert_eq!(db.stock("ABC").unwrap().exchange, "NSE");
        assert_eq!(db.user(1).unwrap().name, "Asha");
    }

    #[test]
    fn test_empty_document_is_an_empty_seed() {
        let seed = Seed::from_json("{}").unwrap();
        assert!(seed.stocks.is_empty() && seed.users.is_empty() && seed.fees.is_empty());
    }

    #[test]
    fn test_from_path_reports_errors() {
        let missing = Seed::from_path(Path::new("missing-seed.json")).unwrap_err();
        assert!(missing.contains("Failed to open seed file"));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ \"stocks\": 3 }").unwrap();
        let invalid = Seed::from_path(file.path()).unwrap_err();
        assert!(invalid.contains("Invalid seed document"));
    }
}
