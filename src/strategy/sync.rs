//! Sequential replay strategy
//!
//! Reads the journal with `SyncReader` and applies each row before reading
//! the next. Engine operations are async, so rows are driven on a
//! current-thread tokio runtime.

use crate::core::RewardsEngine;
use crate::io::csv_format::write_holdings_csv;
use crate::io::sync_reader::SyncReader;
use crate::io::Seed;
use crate::replay::Replayer;
use crate::store::Database;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Single-threaded replay strategy
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, seed: &Seed, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let reader = SyncReader::new(input_path)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let db = Arc::new(Database::new());
        seed.apply(&db);
        let replayer = Replayer::new(RewardsEngine::new(Arc::clone(&db)));

        runtime.block_on(async {
            for result in reader {
                match result {
                    Ok(command) => {
                        let op = command.op();
                        if let Err(error) = replayer.apply(command).await {
                            warn!(op, %error, "command failed");
                        }
                    }
                    Err(error) => warn!(%error, "skipping row"),
                }
            }
        });

        write_holdings_csv(&db.all_holdings(), output)
    }
}
