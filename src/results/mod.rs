//! Result aggregation and suite reports
//!
//! Turns iteration outcomes into run verdicts and collects run reports into a
//! suite-level report that can be written to disk.

pub mod aggregate;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::RunError;
use crate::models::RunReport;

/// Outcome of a whole suite execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Global time limit, human readable
    pub limit: String,
    pub deadline_exceeded: bool,
    /// Runs that never acquired a slot
    pub not_started: Vec<String>,
    pub runs: Vec<RunReport>,
}

impl SuiteReport {
    pub fn total(&self) -> usize {
        self.runs.len()
    }

    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|r| r.failed).count()
    }

    pub fn passed(&self) -> usize {
        self.total() - self.failed()
    }

    /// Failed runs take precedence over an elapsed deadline
    pub fn outcome(&self) -> Result<(), RunError> {
        let failed = self.failed();
        if failed > 0 {
            return Err(RunError::TestsFailed {
                failed,
                total: self.total(),
            });
        }
        if self.deadline_exceeded {
            return Err(RunError::DeadlineExceeded {
                limit: self.limit.clone(),
            });
        }
        Ok(())
    }

    /// Write the report as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;

        info!("Saved suite report to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn run(name: &str, failed: bool) -> RunReport {
        RunReport {
            id: "0123456789abcdef".into(),
            name: name.into(),
            description: "d".into(),
            author: "a".into(),
            variant: "base".into(),
            setup_error: None,
            setup_stack: None,
            log: String::new(),
            iterations: Vec::new(),
            stress: 1,
            failed,
            average_duration: Duration::from_millis(12),
        }
    }

    fn suite(runs: Vec<RunReport>, deadline_exceeded: bool) -> SuiteReport {
        SuiteReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            limit: "5m".into(),
            deadline_exceeded,
            not_started: Vec::new(),
            runs,
        }
    }

    #[test]
    fn test_outcome_all_passed() {
        assert!(suite(vec![run("a", false)], false).outcome().is_ok());
    }

    #[test]
    fn test_outcome_failure_wins_over_deadline() {
        let report = suite(vec![run("a", true), run("b", false)], true);
        assert_eq!(
            report.outcome().unwrap_err(),
            RunError::TestsFailed {
                failed: 1,
                total: 2
            }
        );
    }

    #[test]
    fn test_outcome_deadline() {
        let report = suite(vec![run("a", false)], true);
        assert!(matches!(
            report.outcome().unwrap_err(),
            RunError::DeadlineExceeded { .. }
        ));
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("suite.json");

        let report = suite(vec![run("a", false), run("b", true)], false);
        report.save(&path).unwrap();

        let loaded = SuiteReport::load(&path).unwrap();
        assert_eq!(loaded.total(), 2);
        assert_eq!(loaded.failed(), 1);
        assert_eq!(loaded.runs[0].average_duration, Duration::from_millis(12));
    }
}
