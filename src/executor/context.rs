//! Cancellation context
//!
//! A [`Context`] carries an optional deadline and any number of cancellation
//! signals inherited from its parents. Cancellation is cooperative: holders
//! observe it through [`Context::done`] or [`Context::err`].

use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::error::ContextError;

/// Deadline and cancellation scope passed to every test body
#[derive(Clone, Debug, Default)]
pub struct Context {
    deadline: Option<Instant>,
    signals: Vec<watch::Receiver<bool>>,
}

/// Cancels the context it was created with, explicitly or on drop
#[must_use = "dropping a CancelHandle cancels its context immediately"]
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Context {
    /// Root context that is never done
    pub fn background() -> Self {
        Self::default()
    }

    /// Child context cancelled by the returned handle or by any parent signal
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut signals = self.signals.clone();
        signals.push(rx);

        (
            Context {
                deadline: self.deadline,
                signals,
            },
            CancelHandle { tx },
        )
    }

    /// Child context whose deadline is the earlier of the parent's and `now + timeout`
    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelHandle) {
        let (mut child, handle) = self.with_cancel();
        let deadline = Instant::now() + timeout;
        child.deadline = Some(match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        (child, handle)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, if it is
    pub fn err(&self) -> Option<ContextError> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(ContextError::DeadlineExceeded);
            }
        }
        if self.signals.iter().any(|rx| *rx.borrow()) {
            return Some(ContextError::Cancelled);
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the deadline elapses or any signal fires
    pub async fn done(&self) {
        let cancelled = async {
            let mut waits: FuturesUnordered<_> = self
                .signals
                .iter()
                .cloned()
                .map(|mut rx| async move {
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        futures::future::pending::<()>().await;
                    }
                })
                .collect();

            if waits.next().await.is_none() {
                futures::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = sleep_until(deadline) => {}
                    _ = cancelled => {}
                }
            }
            None => cancelled.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_background_never_done() {
        let ctx = Context::background();
        assert!(ctx.err().is_none());
        assert!(ctx.remaining().is_none());
        assert!(timeout(Duration::from_millis(20), ctx.done()).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children() {
        let (parent, handle) = Context::background().with_cancel();
        let (child, _child_handle) = parent.with_timeout(Duration::from_secs(60));

        handle.cancel();

        timeout(Duration::from_secs(1), child.done()).await.unwrap();
        assert_eq!(child.err(), Some(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_reach_parent() {
        let (parent, _handle) = Context::background().with_cancel();
        let (child, child_handle) = parent.with_cancel();

        drop(child_handle);

        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test]
    async fn test_deadline() {
        let (ctx, _handle) = Context::background().with_timeout(Duration::from_millis(20));
        timeout(Duration::from_secs(1), ctx.done()).await.unwrap();
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_child_deadline_is_bounded_by_parent() {
        let (parent, _h1) = Context::background().with_timeout(Duration::from_millis(50));
        let (child, _h2) = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
