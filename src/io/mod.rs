//! I/O module
//!
//! Handles command journal parsing, seed loading and report output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (command conversion, holdings report)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `seed` - JSON reference data (stocks, users, fees)

pub mod async_reader;
pub mod csv_format;
pub mod seed;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_command_record, write_holdings_csv, CommandRecord};
pub use seed::Seed;
pub use sync_reader::SyncReader;
