//! Live status board
//!
//! Latest state of every run, written by run tasks and read by the progress printer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use super::context::Context;

/// Lifecycle state of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Pending,
    SettingUp,
    Running { completed: usize, total: usize },
    TearingDown,
    Done { failed: bool },
    Cancelled,
}

impl RunState {
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::SettingUp => "setting-up",
            RunState::Running { .. } => "running",
            RunState::TearingDown => "tearing-down",
            RunState::Done { failed: false } => "passed",
            RunState::Done { failed: true } => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done { .. } | RunState::Cancelled)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running { completed, total } => write!(f, "running {completed}/{total}"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Shared map of run key to latest state
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<BTreeMap<String, RunState>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, RunState>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, key: &str, state: RunState) {
        self.lock().insert(key.to_string(), state);
    }

    pub fn get(&self, key: &str) -> Option<RunState> {
        self.lock().get(key).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<String, RunState> {
        self.lock().clone()
    }

    /// Number of runs per state label
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for state in self.lock().values() {
            *counts.entry(state.label()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .counts()
            .into_iter()
            .map(|(label, n)| format!("{label}: {n}"))
            .collect();
        parts.join(" | ")
    }

    /// Periodically log the board until `ctx` is done
    pub fn spawn_progress(&self, ctx: Context, interval: Duration) -> JoinHandle<()> {
        let board = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ctx.done() => break,
                    _ = tokio::time::sleep(interval) => {
                        info!("Progress: {}", board.summary());
                    }
                }
            }
        })
    }
}
