//! Lifecycle of a single run
//!
//! Setup once, then `stress` iterations under a run-local bound, then teardown.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::context::{CancelHandle, Context};
use super::exec_context::{ExecutionContext, LogBuffer};
use super::recovery::{guard, Recovered};
use super::status::{RunState, StatusBoard};
use crate::assert::AssertionFailure;
use crate::models::{IterationOutcome, IterationResult, Payload, RunReport, TeardownFunction};
use crate::platform::Platform;
use crate::registry::RunPlan;
use crate::results::aggregate;
use crate::utils::Timer;

/// Per-suite settings shared by every run
#[derive(Clone, Debug)]
pub(crate) struct RunSettings {
    pub stress: usize,
    pub max_iterations: usize,
    pub skip_teardown: bool,
    pub stop_on_failure: bool,
    pub timeout: Duration,
    pub test_config: String,
}

/// Runs the teardown exactly once, on `finish` or when dropped
struct TeardownGuard {
    teardown: Option<TeardownFunction>,
    skip: bool,
    log: LogBuffer,
    key: String,
}

impl TeardownGuard {
    fn new(teardown: Option<TeardownFunction>, skip: bool, log: LogBuffer, key: String) -> Self {
        Self {
            teardown,
            skip,
            log,
            key,
        }
    }

    fn finish(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };

        if self.skip {
            self.log.write_line("Teardown skipped.");
            info!("Teardown skipped for {}", self.key);
            return;
        }

        debug!("Running teardown for {}", self.key);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(teardown)) {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            self.log.write_line(&format!("Teardown panicked: {message}"));
            error!("Teardown of {} panicked: {}", self.key, message);
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Execute one (test, variant) run
pub(crate) async fn execute_run(
    plan: RunPlan,
    ctx: Context,
    settings: Arc<RunSettings>,
    platform: Platform,
    status: StatusBoard,
    stop: Arc<CancelHandle>,
) -> RunReport {
    let key = plan.key();
    let run_log = LogBuffer::new();
    let run_ctx = ExecutionContext::new(ctx.clone())
        .with_variant(plan.variant.clone(), plan.data.clone())
        .with_config(settings.test_config.clone())
        .with_timeout(settings.timeout)
        .with_platform(platform)
        .with_writer(run_log.clone())
        .with_header(run_log.clone());

    let mut setup_data: Option<Payload> = None;
    let mut teardown = TeardownGuard::new(None, settings.skip_teardown, run_log.clone(), key.clone());

    if let Some(setup) = plan.test.setup.clone() {
        status.set(&key, RunState::SettingUp);
        debug!("Running setup for {}", key);

        let failure = match guard(setup(ctx.clone(), run_ctx.clone())).await {
            Ok(Ok(output)) => {
                setup_data = output.data;
                teardown.teardown = output.teardown;
                None
            }
            Ok(Err(e)) => Some((format!("{e:#}"), None)),
            Err(Recovered::Assertion(failure)) => Some((failure.to_string(), None)),
            Err(Recovered::Panic { message, stack }) => {
                Some((format!("Unhandled panic: {message}"), stack))
            }
        };

        if let Some((message, stack)) = failure {
            warn!("Setup failed for {}: {}", key, message);
            if settings.stop_on_failure {
                stop.cancel();
            }
            status.set(&key, RunState::Done { failed: true });
            return aggregate::setup_failure_report(
                &plan,
                message,
                stack,
                settings.stress,
                run_log.contents(),
            );
        }
    }

    let results = run_iterations(&plan, &ctx, &run_ctx, setup_data, &settings, &status, &stop).await;

    status.set(&key, RunState::TearingDown);
    teardown.finish();

    let report = aggregate::run_report(&plan, results, settings.stress, run_log.contents());
    status.set(
        &key,
        RunState::Done {
            failed: report.failed,
        },
    );
    report
}

async fn run_iterations(
    plan: &RunPlan,
    ctx: &Context,
    run_ctx: &ExecutionContext,
    setup_data: Option<Payload>,
    settings: &RunSettings,
    status: &StatusBoard,
    stop: &Arc<CancelHandle>,
) -> Vec<IterationResult> {
    let key = plan.key();
    let total = settings.stress;
    let semaphore = Arc::new(Semaphore::new(settings.max_iterations));
    let mut tasks = JoinSet::new();
    let mut results = Vec::with_capacity(total);

    status.set(&key, RunState::Running { completed: 0, total });

    for iteration in 0..total {
        let permit = tokio::select! {
            biased;
            _ = ctx.done() => None,
            permit = semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            warn!(
                "{}: deadline reached after dispatching {} of {} iteration(s)",
                key, iteration, total
            );
            break;
        };

        let function = plan.test.function.clone();
        let t = run_ctx.for_iteration(iteration, setup_data.clone(), LogBuffer::new());
        let ctx = ctx.clone();
        let stop = stop.clone();
        let stop_on_failure = settings.stop_on_failure;

        tasks.spawn(async move {
            let _permit = permit;
            let result = run_iteration(function(ctx, t.clone()), &t).await;
            if result.failed() && stop_on_failure {
                stop.cancel();
            }
            result
        });
    }

    loop {
        let joined = tokio::select! {
            biased;
            joined = tasks.join_next() => joined,
            _ = ctx.done() => {
                while let Some(joined) = tasks.try_join_next() {
                    collect(joined, &mut results, &key);
                }
                if !tasks.is_empty() {
                    warn!(
                        "{}: deadline reached with {} iteration(s) still in flight",
                        key,
                        tasks.len()
                    );
                    tasks.detach_all();
                }
                break;
            }
        };

        let Some(joined) = joined else {
            break;
        };
        collect(joined, &mut results, &key);
        status.set(
            &key,
            RunState::Running {
                completed: results.len(),
                total,
            },
        );
    }

    results
}

fn collect(
    joined: Result<IterationResult, tokio::task::JoinError>,
    results: &mut Vec<IterationResult>,
    key: &str,
) {
    match joined {
        Ok(result) => results.push(result),
        Err(e) => error!("{}: iteration task did not complete: {}", key, e),
    }
}

async fn run_iteration(
    body: futures::future::BoxFuture<'static, anyhow::Result<()>>,
    t: &ExecutionContext,
) -> IterationResult {
    let timer = Timer::start(format!("iteration {}", t.iteration()));

    let (outcome, stack) = match guard(body).await {
        Ok(Ok(())) => (IterationOutcome::Success, None),
        Ok(Err(e)) => match e.downcast_ref::<AssertionFailure>() {
            Some(failure) => (IterationOutcome::AssertionFailure(failure.to_string()), None),
            None => (IterationOutcome::Error(format!("{e:#}")), None),
        },
        Err(Recovered::Assertion(failure)) => {
            (IterationOutcome::AssertionFailure(failure.to_string()), None)
        }
        Err(Recovered::Panic { message, stack }) => (IterationOutcome::UnhandledPanic(message), stack),
    };

    let duration = timer.stop();
    if let Some(message) = outcome.message() {
        debug!("Iteration {} failed: {}", t.iteration(), message);
    }

    IterationResult {
        iteration: t.iteration(),
        test_id: t.test_id().to_string(),
        outcome,
        duration,
        log: t.log_contents(),
        stack,
    }
}
