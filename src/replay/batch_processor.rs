//! Batch processing with stock-based partitioning
//!
//! `BatchProcessor` splits a batch of commands into per-stock partitions and
//! replays the partitions concurrently. Commands on the same stock keep their
//! journal order.
//!
//! # Partitioning
//!
//! ```text
//! batch:  issue ABC │ issue XYZ │ refund r1 │ process s1 │ issue ABC
//!         └──────── segment ──────────────┘  barrier     └ segment ┘
//!
//! segment → { ABC: [issue, refund r1], XYZ: [issue] }   (concurrent)
//! ```
//!
//! - `issue` and corporate-action declarations belong to their stock
//! - refunds belong to the stock of the issuance their label names; labels
//!   are remembered across batches
//! - `process` rows can rewrite two stocks, so they run alone after every
//!   earlier row has finished
//!
//! # Thread Safety
//!
//! The processor is cloneable and can be shared across async tasks. The
//! label table is behind an `Arc` and all engine state lives in the shared
//! database.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, warn};

use super::replayer::{ReplayError, Replayer};
use crate::types::Command;

/// Result of replaying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was replayed
    pub command: Command,

    /// The result of replaying it
    pub result: Result<(), ReplayError>,
}

/// Batch processor with stock-based partitioning
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    replayer: Replayer,

    /// Stock of every labelled issuance seen so far
    reward_symbols: Arc<DashMap<String, String>>,
}

impl BatchProcessor {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `replayer` - Replayer that executes commands; clones share its labels
    pub fn new(replayer: Replayer) -> Self {
        Self {
            replayer,
            reward_symbols: Arc::new(DashMap::new()),
        }
    }

    pub fn replayer(&self) -> &Replayer {
        &self.replayer
    }

    /// Stock a command is serialized on
    ///
    /// Labelled issuances are recorded here, so a refund later in the same
    /// batch lands in the same partition as the issuance it names. A refund
    /// naming an unknown label gets a partition of its own; the replayer
    /// rejects it.
    fn partition_key(&self, command: &Command) -> String {
        match command {
            Command::Issue { label, request } => {
                if let Some(label) = label {
                    self.reward_symbols
                        .entry(label.clone())
                        .or_insert_with(|| request.symbol.clone());
                }
                request.symbol.clone()
            }
            Command::Adjust { reward, .. } => self
                .reward_symbols
                .get(reward)
                .map(|symbol| symbol.clone())
                .unwrap_or_else(|| format!("?{}", reward)),
            Command::Declare { request, .. } => request.symbol.clone(),
            Command::Process { action } => format!("!{}", action),
        }
    }

    /// Partition a barrier-free run of commands by stock
    ///
    /// # Guarantees
    ///
    /// - Each command appears in exactly one partition
    /// - Commands in a partition keep their original order
    pub fn partition_by_stock(&self, commands: Vec<Command>) -> HashMap<String, Vec<Command>> {
        let mut partitions: HashMap<String, Vec<Command>> = HashMap::new();

        for command in commands {
            partitions
                .entry(self.partition_key(&command))
                .or_default()
                .push(command);
        }

        partitions
    }

    /// Replay one partition sequentially
    ///
    /// Failures are logged and recorded; they never stop the partition.
    pub async fn process_partition(&self, commands: Vec<Command>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self.replayer.apply(command.clone()).await;
            if let Err(error) = &result {
                warn!(op = command.op(), %error, "command failed");
            }
            results.push(ProcessingResult { command, result });
        }

        results
    }

    /// Replay a batch
    ///
    /// The batch is cut at every barrier. Each segment between barriers is
    /// partitioned by stock and its partitions run as concurrent tokio tasks;
    /// each barrier runs alone once the segment before it has finished.
    ///
    /// # Returns
    ///
    /// One `ProcessingResult` per command. Results within a segment may be
    /// in a different order than the input.
    pub async fn process_batch(&self, batch: Vec<Command>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());
        let mut segment = Vec::new();

        for command in batch {
            if command.is_barrier() {
                results.extend(self.process_segment(std::mem::take(&mut segment)).await);
                results.extend(self.process_partition(vec![command]).await);
            } else {
                segment.push(command);
            }
        }
        results.extend(self.process_segment(segment).await);

        results
    }

    async fn process_segment(&self, segment: Vec<Command>) -> Vec<ProcessingResult> {
        if segment.is_empty() {
            return Vec::new();
        }

        let mut tasks = Vec::new();
        for (_symbol, commands) in self.partition_by_stock(segment) {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_partition(commands).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(partition_results) => results.extend(partition_results),
                Err(e) => error!(error = ?e, "partition task panicked"),
            }
        }

        results
    }
}
