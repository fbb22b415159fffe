//! Command journal replay
//!
//! - `replayer` - Applies single commands and resolves row labels
//! - `batch_processor` - Replays batches with per-stock concurrency

pub mod batch_processor;
pub mod replayer;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use replayer::{ReplayError, Replayer};
