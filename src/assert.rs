//! Assertion helpers for test bodies
//!
//! Assertions raise a typed [`AssertionFailure`] which the executor records as
//! an assertion outcome rather than an unhandled panic. A failure can also be
//! returned as an error from the test body.

use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::panic;

use crate::executor::ExecutionContext;
use crate::utils::Timer;

/// Intentionally raised expectation mismatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssertionFailure {
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub description: Option<String>,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_values(mut self, expected: impl Debug, actual: impl Debug) -> Self {
        self.expected = Some(format!("{expected:?}"));
        self.actual = Some(format!("{actual:?}"));
        self
    }

    /// Abort the current iteration with this failure
    pub fn raise(self) -> ! {
        panic::panic_any(self)
    }
}

impl Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.expected, &self.actual, &self.description) {
            (Some(expected), Some(actual), _) => write!(
                f,
                "[FAIL] {}: expected: '{}', actual '{}'",
                self.message, expected, actual
            ),
            (_, _, Some(description)) => write!(f, "[FAIL] {}: {}", self.message, description),
            _ => write!(f, "[FAIL] {}", self.message),
        }
    }
}

impl std::error::Error for AssertionFailure {}

fn pass(t: &ExecutionContext, message: &str) {
    t.log(format!("- [PASS] {message}"));
}

/// Fail the iteration unless `condition` holds
pub fn assert_that(t: &ExecutionContext, message: &str, condition: bool) {
    if !condition {
        AssertionFailure::new(message)
            .with_description("condition is false")
            .raise();
    }
    pass(t, message);
}

/// Fail the iteration unless `actual == expected`
pub fn assert_eq<T: PartialEq + Debug>(t: &ExecutionContext, message: &str, actual: T, expected: T) {
    if actual != expected {
        AssertionFailure::new(message)
            .with_values(expected, actual)
            .raise();
    }
    pass(t, message);
}

/// Unwrap `result`, failing the iteration on error
pub fn assert_ok<T, E: Display>(t: &ExecutionContext, message: &str, result: Result<T, E>) -> T {
    match result {
        Ok(value) => {
            pass(t, message);
            value
        }
        Err(err) => AssertionFailure::new(message)
            .with_description(err.to_string())
            .raise(),
    }
}

/// Fail the iteration unconditionally
pub fn fail(message: impl Into<String>) -> ! {
    AssertionFailure::new(message).raise()
}

/// Run a named step, failing the iteration if it returns an error.
///
/// The step name and its duration are written to the iteration log.
pub async fn step<F, T, E>(t: &ExecutionContext, name: &str, step: F) -> T
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let timer = Timer::start(name);
    t.log(name);

    let value = assert_ok(t, "step should not return any error", step.await);

    t.log(format!("took: {}ms\n", timer.elapsed_ms()));
    t.mark_step();
    value
}
