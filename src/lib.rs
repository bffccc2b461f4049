//! stresscheck - concurrent stress runner for integration test suites
//!
//! Test authors register [`TestDefinition`]s in a [`Registry`]; the
//! [`Scheduler`] runs every selected (test, variant) pair `stress` times under
//! nested concurrency bounds and a global deadline, recovering panics per
//! iteration and guaranteeing teardown once per run.
//!
//! ## Usage
//!
//! ```no_run
//! use stresscheck::{Registry, TestDefinition};
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let mut registry = Registry::new();
//!     registry
//!         .register(
//!             TestDefinition::new("Create a namespace")
//!                 .description("Creates a namespace and reads it back.")
//!                 .author("QA")
//!                 .tag("namespaces")
//!                 .function(|_ctx, t| async move {
//!                     t.log("namespace created");
//!                     Ok(())
//!                 }),
//!         )
//!         .expect("valid test");
//!
//!     stresscheck::cli::run(registry).await
//! }
//! ```
//!
//! ```bash
//! # List tests, then tags with their test count
//! stresscheck list
//! stresscheck list --tags
//!
//! # Run a tag 50 times per variant, 10 runs at once, within 10 minutes
//! stresscheck run -t namespaces -s 50 -c 10 -l 10m
//! ```

pub mod assert;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod models;
pub mod output;
pub mod platform;
pub mod push;
pub mod registry;
pub mod results;
pub mod utils;

pub use assert::{assert_eq, assert_ok, assert_that, fail, step, AssertionFailure};
pub use config::RunnerConfig;
pub use error::{PushError, RegistrationError, RunError};
pub use executor::{Context, ExecutionContext, Scheduler, SchedulerConfig};
pub use models::{
    IterationOutcome, IterationResult, RunReport, SetupOutput, Test, TestDefinition, Variants,
    Verdict, BASE_VARIANT,
};
pub use platform::Platform;
pub use push::{assert_no_push, assert_push, EventType, Listener, PushOutcome, WaitHandle};
pub use registry::{Registry, Suite};
pub use results::SuiteReport;
