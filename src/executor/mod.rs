//! Test execution engine
//!
//! Runs suites concurrently: setup, stress iterations and teardown per run,
//! with panic recovery, a global deadline and cooperative cancellation.

mod context;
mod exec_context;
pub(crate) mod recovery;
mod run;
mod scheduler;
mod status;

pub use context::{CancelHandle, Context};
pub use exec_context::{ExecutionContext, LogBuffer};
pub use recovery::{guard, install_panic_hook, Guarded, Recovered};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use status::{RunState, StatusBoard};

/// Fresh random identifier for an iteration
pub fn new_test_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_test_id() {
        let a = new_test_id();
        let b = new_test_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
