//! Replay strategies
//!
//! A strategy runs a whole replay: it seeds a fresh database, reads the
//! command journal, applies every command and writes the final holdings.
//!
//! - `sync` - Reads and applies rows one at a time on a single thread
//! - `async` - Reads rows in batches and replays each batch with per-stock
//!   concurrency on a multi-threaded runtime
//!
//! Both strategies produce the same holdings for the same journal.

use crate::cli::StrategyType;
use crate::io::Seed;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// A complete replay pipeline
pub trait ProcessingStrategy: Send + Sync {
    /// Replay a command journal and write the final holdings
    ///
    /// # Arguments
    ///
    /// * `seed` - Stocks, users and fee rates loaded before the first row
    /// * `input_path` - Path to the command journal CSV
    /// * `output` - Writer for the holdings report
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the journal was replayed, even when some rows were rejected
    /// * `Err(String)` if a fatal error occurred
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The runtime cannot be started
    /// - Output cannot be written
    ///
    /// Rejected rows are logged and skipped.
    fn process(&self, seed: &Seed, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch processing (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config))
        }
    }
}
