//! Iteration and run result models
//!
//! Defines iteration outcomes, per-run verdicts and the report handed to reporters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome of one execution of a test function
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum IterationOutcome {
    Success,
    AssertionFailure(String),
    UnhandledPanic(String),
    Error(String),
}

impl IterationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IterationOutcome::Success)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            IterationOutcome::Success => None,
            IterationOutcome::AssertionFailure(m)
            | IterationOutcome::UnhandledPanic(m)
            | IterationOutcome::Error(m) => Some(m),
        }
    }
}

impl fmt::Display for IterationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationOutcome::Success => write!(f, "PASS"),
            IterationOutcome::AssertionFailure(m) => write!(f, "{m}"),
            IterationOutcome::UnhandledPanic(m) => write!(f, "Unhandled panic: {m}"),
            IterationOutcome::Error(m) => write!(f, "{m}"),
        }
    }
}

/// Result of a single iteration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IterationResult {
    /// Zero-based iteration index within the run
    pub iteration: usize,
    /// Identifier generated for this iteration
    pub test_id: String,
    pub outcome: IterationOutcome,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub log: String,
    pub stack: Option<String>,
}

impl IterationResult {
    pub fn failed(&self) -> bool {
        !self.outcome.is_success()
    }
}

/// Pass/fail verdict of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub failed: bool,
    #[serde(with = "duration_ms")]
    pub average_duration: Duration,
}

/// Everything reporters need to know about one (test, variant) run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub variant: String,
    /// Setup error or panic that aborted the run before any iteration
    pub setup_error: Option<String>,
    pub setup_stack: Option<String>,
    /// Run log written by setup and teardown
    pub log: String,
    pub iterations: Vec<IterationResult>,
    /// Iterations requested for this run
    pub stress: usize,
    pub failed: bool,
    #[serde(with = "duration_ms")]
    pub average_duration: Duration,
}

impl RunReport {
    pub fn verdict(&self) -> Verdict {
        Verdict {
            failed: self.failed,
            average_duration: self.average_duration,
        }
    }

    /// True when fewer iterations reported than requested
    pub fn is_partial(&self) -> bool {
        self.setup_error.is_none() && self.iterations.len() < self.stress
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {} (variant {}) it: {}, avg: {}ms",
            if self.failed { "FAIL" } else { "PASS" },
            self.name,
            self.variant,
            self.iterations.len(),
            self.average_duration.as_millis()
        )
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
