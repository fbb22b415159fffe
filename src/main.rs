//! Stock Rewards Engine CLI
//!
//! Replays a command journal against a fresh in-memory engine and prints the
//! resulting holdings as CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --seed seed.json commands.csv > holdings.csv
//! cargo run -- --seed seed.json --strategy sync commands.csv > holdings.csv
//! cargo run -- --seed seed.json --strategy async --batch-size 2000 --max-concurrent 8 commands.csv
//! RUST_LOG=stock_rewards_engine=info cargo run -- --seed seed.json commands.csv
//! ```
//!
//! Logs go to stderr; rejected rows are reported at `warn`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, unreadable input or seed, output failure)

use stock_rewards_engine::cli;
use stock_rewards_engine::io::Seed;
use stock_rewards_engine::strategy;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let args = cli::parse_args();

    let seed = match &args.seed_file {
        Some(path) => match Seed::from_path(path) {
            Ok(seed) => seed,
            Err(e) => fail(&e),
        },
        None => Seed::default(),
    };

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config)
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&seed, &args.input_file, &mut output) {
        fail(&e);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}
