//! stresscheck - Concurrent Stress Runner for Integration Test Suites
//!
//! Registers a demonstration suite and hands it to the command-line runner.
//!
//! ## Usage
//!
//! ```bash
//! # List registered tests, or tags with their test count
//! stresscheck list
//! stresscheck list --tags
//!
//! # Run every test once
//! stresscheck run
//!
//! # Run the step tests 20 times each, 5 iterations at a time
//! stresscheck run -t step -s 20 --concurrent-iterations 5
//!
//! # Run one variant only, keeping the resources around
//! stresscheck run -t variants -v data-variant -S
//!
//! # Stop scheduling new runs after the first failure, JSON output
//! stresscheck run --stop-on-failure -f json -o report.json
//! ```

use std::process::ExitCode;
use tracing::error;

mod demo;

use stresscheck::Registry;

#[tokio::main]
async fn main() -> ExitCode {
    let mut registry = Registry::new();
    if let Err(e) = registry.register_all(demo::suite()) {
        stresscheck::utils::init_logger(stresscheck::utils::LogLevel::Error);
        error!("Invalid test registration: {}", e);
        return ExitCode::from(2);
    }

    stresscheck::cli::run(registry).await
}
