//! Suite scheduler
//!
//! Dispatches every (test, variant) run of a suite under a global deadline
//! and a bounded pool of concurrent runs.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::context::Context;
use super::recovery::install_panic_hook;
use super::run::{execute_run, RunSettings};
use super::status::{RunState, StatusBoard};
use crate::config::format_duration;
use crate::error::{ContextError, RunError};
use crate::output::{NullReporter, Reporter};
use crate::platform::Platform;
use crate::registry::Suite;
use crate::results::SuiteReport;

/// Knobs of a suite execution
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Runs allowed to be active at once
    pub max_concurrent_runs: usize,
    /// Iterations of the same run allowed to be active at once
    pub max_concurrent_iterations: usize,
    /// Iterations per run
    pub stress: usize,
    pub stop_on_failure: bool,
    pub skip_teardown: bool,
    pub verbose: bool,
    /// Global time limit
    pub limit: Duration,
    /// Free-form configuration handed to every test
    pub test_config: String,
    pub progress_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 20,
            max_concurrent_iterations: 20,
            stress: 1,
            stop_on_failure: false,
            skip_teardown: false,
            verbose: false,
            limit: Duration::from_secs(300),
            test_config: String::new(),
            progress_interval: Duration::from_secs(10),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), RunError> {
        if self.max_concurrent_runs == 0 {
            return Err(RunError::Bootstrap(
                "concurrent runs must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_iterations == 0 {
            return Err(RunError::Bootstrap(
                "concurrent iterations must be at least 1".to_string(),
            ));
        }
        if self.stress == 0 {
            return Err(RunError::Bootstrap("stress must be at least 1".to_string()));
        }
        if self.limit.is_zero() {
            return Err(RunError::Bootstrap("time limit must be positive".to_string()));
        }
        Ok(())
    }
}

/// Executes suites
pub struct Scheduler {
    config: SchedulerConfig,
    platform: Platform,
    reporter: Arc<dyn Reporter>,
    status: StatusBoard,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            platform: Platform::default(),
            reporter: Arc::new(NullReporter),
            status: StatusBoard::new(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Reporter called as each run completes
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Live state of every run
    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Execute the suite and fold the result into the suite outcome
    pub async fn run(&self, parent: &Context, suite: &Suite) -> Result<SuiteReport, RunError> {
        let report = self.execute(parent, suite).await?;
        report.outcome()?;
        Ok(report)
    }

    /// Execute the suite and return every run report, failed or not
    pub async fn execute(&self, parent: &Context, suite: &Suite) -> Result<SuiteReport, RunError> {
        self.config.validate()?;
        install_panic_hook();

        let started_at = Utc::now();
        let (ctx, _deadline) = parent.with_timeout(self.config.limit);
        let (stop_ctx, stop) = ctx.with_cancel();
        let stop = Arc::new(stop);

        let settings = Arc::new(RunSettings {
            stress: self.config.stress,
            max_iterations: self.config.max_concurrent_iterations,
            skip_teardown: self.config.skip_teardown,
            stop_on_failure: self.config.stop_on_failure,
            timeout: self.config.limit,
            test_config: self.config.test_config.clone(),
        });

        let plans = suite.plans();
        for plan in &plans {
            self.status.set(&plan.key(), RunState::Pending);
        }

        info!(
            "Running {} run(s) of {} test(s): {} concurrent run(s), {} concurrent iteration(s), stress {}, limit {}",
            plans.len(),
            suite.len(),
            self.config.max_concurrent_runs,
            self.config.max_concurrent_iterations,
            self.config.stress,
            format_duration(self.config.limit)
        );

        let progress = self.config.verbose.then(|| {
            let (progress_ctx, handle) = ctx.with_cancel();
            let task = self
                .status
                .spawn_progress(progress_ctx, self.config.progress_interval);
            (task, handle)
        });

        let pool = Arc::new(Semaphore::new(self.config.max_concurrent_runs));
        let mut runs = JoinSet::new();
        let mut not_started = Vec::new();

        for plan in plans {
            let key = plan.key();
            let permit = tokio::select! {
                biased;
                _ = stop_ctx.done() => None,
                permit = pool.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit.filter(|_| !stop_ctx.is_done()) else {
                self.status.set(&key, RunState::Cancelled);
                not_started.push(key);
                continue;
            };

            let ctx = ctx.clone();
            let settings = settings.clone();
            let platform = self.platform.clone();
            let status = self.status.clone();
            let stop = stop.clone();
            let reporter = self.reporter.clone();

            runs.spawn(async move {
                let _permit = permit;
                let report = execute_run(plan, ctx, settings, platform, status, stop).await;
                reporter.report(&report);
                report
            });
        }

        if !not_started.is_empty() {
            warn!("{} run(s) never started", not_started.len());
        }

        let mut reports = Vec::new();
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("Run task did not complete: {}", e),
            }
        }
        reports.sort_by(|a, b| (&a.name, &a.variant).cmp(&(&b.name, &b.variant)));

        let deadline_exceeded = ctx.err() == Some(ContextError::DeadlineExceeded);
        if deadline_exceeded {
            warn!(
                "Deadline of {} exceeded",
                format_duration(self.config.limit)
            );
        }

        if let Some((task, handle)) = progress {
            handle.cancel();
            if let Err(e) = task.await {
                error!("Progress task failed: {}", e);
            }
        }

        let report = SuiteReport {
            started_at,
            finished_at: Utc::now(),
            limit: format_duration(self.config.limit),
            deadline_exceeded,
            not_started,
            runs: reports,
        };
        self.reporter.finish(&report);

        info!(
            "Suite completed - Pass: {}/{}",
            report.passed(),
            report.total()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert::AssertionFailure;
    use crate::models::{IterationOutcome, SetupOutput, TestDefinition, Variants};
    use crate::output::MemoryReporter;
    use crate::registry::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn def(name: &str) -> TestDefinition {
        TestDefinition::new(name)
            .description("desc")
            .author("author")
            .tag("unit")
    }

    fn suite(defs: Vec<TestDefinition>) -> Suite {
        let mut registry = Registry::new();
        for def in defs {
            registry.register(def).unwrap();
        }
        registry.suite()
    }

    fn config(stress: usize) -> SchedulerConfig {
        SchedulerConfig {
            stress,
            limit: Duration::from_secs(30),
            ..SchedulerConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stress_all_pass() {
        let suite = suite(vec![def("passing").function(|_, _| async { Ok(()) })]);
        let scheduler = Scheduler::new(config(5));

        let report = scheduler.run(&Context::background(), &suite).await.unwrap();
        assert_eq!(report.total(), 1);
        assert!(!report.runs[0].failed);
        assert_eq!(report.runs[0].iterations.len(), 5);
        assert!(!report.deadline_exceeded);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panic_fails_only_its_iteration() {
        let suite = suite(vec![def("flaky").function(|_, t| async move {
            if t.iteration() == 1 {
                panic!("unexpected status code");
            }
            Ok(())
        })]);
        let scheduler = Scheduler::new(config(3));

        let report = scheduler.execute(&Context::background(), &suite).await.unwrap();
        let run = &report.runs[0];

        assert!(run.failed);
        assert_eq!(run.iterations.len(), 3);
        assert_eq!(run.iterations.iter().filter(|r| r.stack.is_some()).count(), 1);
        assert!(matches!(
            run.iterations[1].outcome,
            IterationOutcome::UnhandledPanic(_)
        ));
        assert!(run.iterations[0].outcome.is_success());
        assert!(run.iterations[2].outcome.is_success());
        assert_eq!(
            report.outcome().unwrap_err(),
            RunError::TestsFailed { failed: 1, total: 1 }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_on_failure_prevents_later_runs() {
        let setups = Arc::new(AtomicUsize::new(0));
        let counter = setups.clone();

        let suite = suite(vec![
            def("a failing").function(|_, _| async {
                Err(anyhow::Error::new(AssertionFailure::new("status code")))
            }),
            def("b later")
                .setup(move |_, _| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(SetupOutput::new())
                    }
                })
                .function(|_, _| async { Ok(()) }),
        ]);

        let scheduler = Scheduler::new(SchedulerConfig {
            max_concurrent_runs: 1,
            stop_on_failure: true,
            ..config(1)
        });

        let report = scheduler.execute(&Context::background(), &suite).await.unwrap();
        assert_eq!(setups.load(Ordering::SeqCst), 0);
        assert_eq!(report.total(), 1);
        assert_eq!(report.not_started, vec!["b later (variant base)".to_string()]);
        assert_eq!(
            scheduler.status().get("b later (variant base)"),
            Some(RunState::Cancelled)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_iteration_bound_is_per_run() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());

        let suite = suite(vec![def("bounded").function(move |_, _| {
            let (active, peak) = (a.clone(), p.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })]);

        let scheduler = Scheduler::new(SchedulerConfig {
            max_concurrent_iterations: 2,
            ..config(5)
        });

        let report = scheduler.run(&Context::background(), &suite).await.unwrap();
        assert_eq!(report.runs[0].iterations.len(), 5);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_bound() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let defs = (0..4)
            .map(|i| {
                let (active, peak) = (active.clone(), peak.clone());
                def(&format!("run {i}")).function(move |_, _| {
                    let (active, peak) = (active.clone(), peak.clone());
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
            })
            .collect();

        let scheduler = Scheduler::new(SchedulerConfig {
            max_concurrent_runs: 2,
            ..config(1)
        });

        let report = scheduler.run(&Context::background(), &suite(defs)).await.unwrap();
        assert_eq!(report.total(), 4);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_one_run_per_variant() {
        let suite = suite(vec![def("variants")
            .variants(Variants::new().with("small", 1u32).with("large", 100u32))
            .function(|_, t| async move {
                assert!(t.variant_data::<u32>().is_some());
                Ok(())
            })]);

        let reporter = Arc::new(MemoryReporter::new());
        let scheduler = Scheduler::new(config(1)).with_reporter(reporter.clone());

        let report = scheduler.run(&Context::background(), &suite).await.unwrap();
        let variants: Vec<&str> = report.runs.iter().map(|r| r.variant.as_str()).collect();
        assert_eq!(variants, vec!["large", "small"]);
        assert_eq!(reporter.reports().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deadline_exceeded() {
        let suite = suite(vec![def("slow").function(|ctx, _| async move {
            ctx.done().await;
            Ok(())
        })]);

        let scheduler = Scheduler::new(SchedulerConfig {
            limit: Duration::from_millis(50),
            ..config(1)
        });

        let err = scheduler.run(&Context::background(), &suite).await.unwrap_err();
        assert!(matches!(err, RunError::DeadlineExceeded { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_teardown_runs_once_when_deadline_fires() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let counter = teardowns.clone();

        let suite = suite(vec![def("slow with teardown")
            .setup(move |_, _| {
                let counter = counter.clone();
                async move {
                    Ok(SetupOutput::new().with_teardown(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }))
                }
            })
            .function(|ctx, _| async move {
                ctx.done().await;
                Ok(())
            })]);

        let scheduler = Scheduler::new(SchedulerConfig {
            limit: Duration::from_millis(50),
            ..config(4)
        });

        let report = scheduler.execute(&Context::background(), &suite).await.unwrap();
        assert!(report.deadline_exceeded);
        assert_eq!(report.total(), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_reported_before_deadline() {
        let suite = suite(vec![
            def("fails").function(|_, _| async { anyhow::bail!("nope") }),
            def("slow").function(|ctx, _| async move {
                ctx.done().await;
                Ok(())
            }),
        ]);

        let scheduler = Scheduler::new(SchedulerConfig {
            limit: Duration::from_millis(50),
            ..config(1)
        });

        let report = scheduler.execute(&Context::background(), &suite).await.unwrap();
        assert!(report.deadline_exceeded);
        assert!(matches!(
            report.outcome().unwrap_err(),
            RunError::TestsFailed { failed: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_is_bootstrap_error() {
        let scheduler = Scheduler::new(SchedulerConfig {
            max_concurrent_runs: 0,
            ..SchedulerConfig::default()
        });
        let err = scheduler
            .execute(&Context::background(), &suite(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Bootstrap(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
