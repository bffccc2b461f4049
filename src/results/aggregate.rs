//! Result aggregation
//!
//! Reduces a run's iteration results to a verdict and builds the run report.

use std::time::Duration;

use crate::models::{IterationResult, RunReport, Verdict};
use crate::registry::RunPlan;

/// True if any iteration did not succeed
pub fn has_failures(results: &[IterationResult]) -> bool {
    results.iter().any(IterationResult::failed)
}

/// Mean iteration duration rounded to the millisecond; zero without results
pub fn average_duration(results: &[IterationResult]) -> Duration {
    if results.is_empty() {
        return Duration::ZERO;
    }

    let total: u128 = results.iter().map(|r| r.duration.as_nanos()).sum();
    let mean = total / results.len() as u128;
    let millis = (mean + 500_000) / 1_000_000;

    Duration::from_millis(millis as u64)
}

pub fn verdict(results: &[IterationResult]) -> Verdict {
    Verdict {
        failed: has_failures(results),
        average_duration: average_duration(results),
    }
}

/// Report of a run whose iterations executed, fully or partially
pub fn run_report(
    plan: &RunPlan,
    mut results: Vec<IterationResult>,
    stress: usize,
    log: String,
) -> RunReport {
    results.sort_by_key(|r| r.iteration);
    let verdict = verdict(&results);

    RunReport {
        id: plan.test.id.clone(),
        name: plan.test.name.clone(),
        description: plan.test.description.clone(),
        author: plan.test.author.clone(),
        variant: plan.variant.clone(),
        setup_error: None,
        setup_stack: None,
        log,
        iterations: results,
        stress,
        failed: verdict.failed,
        average_duration: verdict.average_duration,
    }
}

/// Report of a run aborted by its setup function
pub fn setup_failure_report(
    plan: &RunPlan,
    error: String,
    stack: Option<String>,
    stress: usize,
    log: String,
) -> RunReport {
    RunReport {
        setup_error: Some(error),
        setup_stack: stack,
        failed: true,
        ..run_report(plan, Vec::new(), stress, log)
    }
}
