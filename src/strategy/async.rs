//! Asynchronous batch replay strategy
//!
//! Reads the journal in batches and replays each batch with per-stock
//! concurrency on a multi-threaded tokio runtime.
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (stock partitioning + barriers)
//!         └── Replayer → RewardsEngine → Database
//! ```
//!
//! Batches are replayed one after another, so a stock's commands keep their
//! journal order across the whole file.

use crate::core::RewardsEngine;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_holdings_csv;
use crate::io::Seed;
use crate::replay::{BatchProcessor, Replayer};
use crate::store::Database;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a configuration, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid concurrency, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Multi-threaded batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, seed: &Seed, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let db = Arc::new(Database::new());
        seed.apply(&db);

        runtime.block_on(async {
            let processor =
                BatchProcessor::new(Replayer::new(RewardsEngine::new(Arc::clone(&db))));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                let failed = results.iter().filter(|r| r.result.is_err()).count();
                debug!(commands = results.len(), failed, "batch replayed");
            }

            Ok::<(), String>(())
        })?;

        write_holdings_csv(&db.all_holdings(), output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Stock, User};
    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "op,ref,user,symbol,quantity,target,ratio,effective_date,idempotency_key,description\n";

    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(HEADER.as_bytes())
            .expect("Failed to write to temp file");
        file.write_all(rows.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn seed() -> Seed {
        Seed {
            stocks: vec![
                Stock::new("ABC", "Abc Ltd", dec!(100)),
                Stock::new("XYZ", "Xyz Ltd", dec!(40)),
            ],
            users: vec![User::new(1, "Asha"), User::new(2, "Ravi")],
            fees: vec![],
        }
    }

    fn run(config: BatchConfig, rows: &str) -> String {
        let file = create_temp_csv(rows);
        let mut output = Vec::new();
        AsyncProcessingStrategy::new(config)
            .process(&seed(), file.path(), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_async_strategy_replays_multiple_stocks() {
        let output = run(
            BatchConfig::default(),
            "issue,,1,ABC,10,,,,,\n\
             issue,,2,XYZ,5,,,,,\n\
             issue,,1,XYZ,1,,,,,\n",
        );

        assert_eq!(
            output,
            "user,symbol,quantity,average_cost\n\
             1,ABC,10.000000,100.000000\n\
             1,XYZ,1.000000,40.000000\n\
             2,XYZ,5.000000,40.000000\n"
        );
    }

    #[test]
    fn test_async_strategy_maintains_ordering_across_batches() {
        let output = run(
            BatchConfig::new(2, num_cpus::get()),
            "issue,r1,1,ABC,10,,,,,\n\
             issue,,2,XYZ,5,,,,,\n\
             partial_refund,r1,,,3,,,,,\n\
             split,s1,,ABC,,,2,2024-01-01,,\n\
             process,s1,,,,,,,,\n\
             partial_refund,r1,,,7,,,,,\n",
        );

        // The second refund runs after the split, so 7 of the 14 post-split
        // units remain.
        assert_eq!(
            output,
            "user,symbol,quantity,average_cost\n\
             1,ABC,7.000000,50.000000\n\
             2,XYZ,5.000000,40.000000\n"
        );
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let mut output = Vec::new();
        let result = AsyncProcessingStrategy::new(BatchConfig::default()).process(
            &seed(),
            Path::new("nonexistent.csv"),
            &mut output,
        );
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_batch_config_replaces_zero_values() {
        let config = BatchConfig::new(0, 0);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_concurrent_batches, num_cpus::get());
    }
}
