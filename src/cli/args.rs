use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay a stock reward command journal and print the resulting holdings
#[derive(Parser, Debug)]
#[command(name = "stock-rewards-engine")]
#[command(about = "Replay stock reward and corporate action commands", long_about = None)]
pub struct CliArgs {
    /// Command journal CSV
    #[arg(value_name = "INPUT", help = "Path to the command journal CSV file")]
    pub input_file: PathBuf,

    /// Reference data loaded before the first command
    #[arg(
        long = "seed",
        value_name = "FILE",
        help = "JSON file with the stocks, users and fee rates to start from"
    )]
    pub seed_file: Option<PathBuf>,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for sequential or 'async' for per-stock concurrency"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,
}

/// Available replay strategies
#[derive(Clone, Debug, PartialEq, ValueEnum)]
pub enum StrategyType {
    /// One command at a time on a single thread
    Sync,
    /// Batches replayed with per-stock concurrency
    Async,
}

impl CliArgs {
    /// Build the async batch configuration from the command line
    ///
    /// Options left out fall back to `BatchConfig::default()`.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }
}
