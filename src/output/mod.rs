//! Output formatting module
//!
//! Reporters receive each run report as it completes and the suite report at
//! the end.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use crate::models::RunReport;
use crate::results::SuiteReport;

/// Consumer of run reports
pub trait Reporter: Send + Sync {
    /// Called once per run, from the task that executed it
    fn report(&self, run: &RunReport);

    /// Called once the suite is over
    fn finish(&self, _suite: &SuiteReport) {}
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _run: &RunReport) {}
}

/// Writes formatted reports to stdout
#[derive(Debug)]
pub struct ConsoleReporter {
    formatter: ResultFormatter,
}

impl ConsoleReporter {
    pub fn new(formatter: ResultFormatter) -> Self {
        if formatter.format() == OutputFormat::Csv {
            println!("{}", ResultFormatter::csv_header());
        }
        Self { formatter }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, run: &RunReport) {
        let output = self.formatter.format_run(run);
        let mut stdout = io::stdout().lock();
        let _ = match self.formatter.format() {
            OutputFormat::Table => write!(stdout, "{output}"),
            _ => writeln!(stdout, "{output}"),
        };
    }

    fn finish(&self, suite: &SuiteReport) {
        let output = self.formatter.format_suite(suite);
        if output.is_empty() {
            return;
        }
        // Runs were already streamed one per line.
        if matches!(self.formatter.format(), OutputFormat::Json | OutputFormat::JsonPretty) {
            return;
        }
        let _ = write!(io::stdout().lock(), "{output}");
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    runs: Mutex<Vec<RunReport>>,
    suite: Mutex<Option<SuiteReport>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> MutexGuard<'_, Vec<RunReport>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run reports in arrival order
    pub fn reports(&self) -> Vec<RunReport> {
        self.runs().clone()
    }

    pub fn suite(&self) -> Option<SuiteReport> {
        self.suite
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, run: &RunReport) {
        self.runs().push(run.clone());
    }

    fn finish(&self, suite: &SuiteReport) {
        *self.suite.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(suite.clone());
    }
}
