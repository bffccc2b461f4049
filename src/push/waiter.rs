//! Push-event waiter
//!
//! Arming a [`Listener`] opens a subscription and waits for the initial
//! connection only. The returned [`WaitHandle`] is resolved later, after the
//! action expected to produce (or not produce) the event.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use super::event::{EventType, PushEvent, SubscriberStatus, Subscriber, SubscriptionChannels};
use crate::error::PushError;
use crate::executor::{CancelHandle, Context};

pub const DEFAULT_POSITIVE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_NEGATIVE_TIMEOUT: Duration = Duration::from_secs(3);

type EventFilter = Arc<dyn Fn(&PushEvent) -> bool + Send + Sync>;

/// Whether the event is expected to arrive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expectation {
    Push,
    NoPush,
}

/// Terminal signal of a wait
#[derive(Clone, Debug, PartialEq)]
pub enum PushOutcome {
    Matched(PushEvent),
    /// The window elapsed without a matching event
    NotMatched,
    ConnectionError(String),
}

/// Description of the event to wait for
#[derive(Clone)]
pub struct Listener {
    identity: String,
    event_type: EventType,
    expectation: Expectation,
    filter: Option<EventFilter>,
    positive_timeout: Duration,
    negative_timeout: Duration,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("identity", &self.identity)
            .field("event_type", &self.event_type)
            .field("expectation", &self.expectation)
            .field("filter", &self.filter.is_some())
            .field("positive_timeout", &self.positive_timeout)
            .field("negative_timeout", &self.negative_timeout)
            .finish()
    }
}

impl Listener {
    fn new(identity: impl Into<String>, event_type: EventType, expectation: Expectation) -> Self {
        Self {
            identity: identity.into(),
            event_type,
            expectation,
            filter: None,
            positive_timeout: DEFAULT_POSITIVE_TIMEOUT,
            negative_timeout: DEFAULT_NEGATIVE_TIMEOUT,
        }
    }

    /// Wait for a `event_type` event on `identity`
    pub fn expect(identity: impl Into<String>, event_type: EventType) -> Self {
        Self::new(identity, event_type, Expectation::Push)
    }

    /// Make sure no `event_type` event on `identity` shows up
    pub fn expect_none(identity: impl Into<String>, event_type: EventType) -> Self {
        Self::new(identity, event_type, Expectation::NoPush)
    }

    /// Extra predicate on top of identity and type; non-matching events are ignored
    pub fn with_filter(mut self, filter: impl Fn(&PushEvent) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_positive_timeout(mut self, timeout: Duration) -> Self {
        self.positive_timeout = timeout;
        self
    }

    pub fn with_negative_timeout(mut self, timeout: Duration) -> Self {
        self.negative_timeout = timeout;
        self
    }

    pub fn expectation(&self) -> Expectation {
        self.expectation
    }

    /// Window the handle waits for
    pub fn timeout(&self) -> Duration {
        match self.expectation {
            Expectation::Push => self.positive_timeout,
            Expectation::NoPush => self.negative_timeout,
        }
    }

    fn matches(&self, event: &PushEvent) -> bool {
        event.identity == self.identity
            && event.event_type == self.event_type
            && self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Start the subscription and block until it is connected
    pub async fn arm(
        self,
        ctx: &Context,
        subscriber: &mut dyn Subscriber,
    ) -> Result<WaitHandle, PushError> {
        let (sub_ctx, cancel) = ctx.with_timeout(self.timeout());
        let mut channels = subscriber.start(sub_ctx.clone());

        connect(&sub_ctx, &mut channels).await?;
        debug!(
            "Listening for '{}' events on '{}' for {}ms",
            self.event_type,
            self.identity,
            self.timeout().as_millis()
        );

        let (tx, rx) = oneshot::channel();
        let listener = self.clone();
        tokio::spawn(async move {
            let outcome = watch(&sub_ctx, &mut channels, &listener).await;
            let _ = tx.send(outcome);
        });

        Ok(WaitHandle {
            outcome: rx,
            _cancel: cancel,
            identity: self.identity,
            event_type: self.event_type,
            expectation: self.expectation,
        })
    }
}

async fn connect(ctx: &Context, channels: &mut SubscriptionChannels) -> Result<(), PushError> {
    let mut errors_open = true;
    let mut status_open = true;

    loop {
        if !errors_open && !status_open {
            return Err(PushError::SubscriptionConnectFailed(
                "subscription channels closed".to_string(),
            ));
        }

        tokio::select! {
            status = channels.status.recv(), if status_open => match status {
                Some(SubscriberStatus::Connected) => return Ok(()),
                Some(SubscriberStatus::Disconnected) => {
                    return Err(PushError::SubscriptionConnectFailed(
                        "disconnected before connecting".to_string(),
                    ))
                }
                Some(SubscriberStatus::Reconnected) => {}
                None => status_open = false,
            },
            error = channels.errors.recv(), if errors_open => match error {
                Some(error) => return Err(PushError::SubscriptionConnectFailed(error)),
                None => errors_open = false,
            },
            _ = ctx.done() => {
                let reason = ctx
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "context done".to_string());
                return Err(PushError::SubscriptionConnectFailed(reason));
            }
        }
    }
}

async fn watch(ctx: &Context, channels: &mut SubscriptionChannels, listener: &Listener) -> PushOutcome {
    let mut errors_open = true;
    let mut status_open = true;

    loop {
        tokio::select! {
            biased;
            _ = ctx.done() => return PushOutcome::NotMatched,
            event = channels.events.recv() => match event {
                Some(event) if listener.matches(&event) => return PushOutcome::Matched(event),
                Some(_) => {}
                None => return PushOutcome::ConnectionError("event channel closed".to_string()),
            },
            error = channels.errors.recv(), if errors_open => match error {
                Some(error) => return PushOutcome::ConnectionError(error),
                None => errors_open = false,
            },
            status = channels.status.recv(), if status_open => match status {
                Some(SubscriberStatus::Disconnected) => {
                    return PushOutcome::ConnectionError("subscription disconnected".to_string())
                }
                Some(_) => {}
                None => status_open = false,
            },
        }
    }
}

/// Armed listener, resolved once the triggering action is done
#[must_use = "an armed listener does nothing until resolved"]
pub struct WaitHandle {
    outcome: oneshot::Receiver<PushOutcome>,
    _cancel: CancelHandle,
    identity: String,
    event_type: EventType,
    expectation: Expectation,
}

impl fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle")
            .field("identity", &self.identity)
            .field("event_type", &self.event_type)
            .field("expectation", &self.expectation)
            .finish()
    }
}

impl WaitHandle {
    pub fn expectation(&self) -> Expectation {
        self.expectation
    }

    /// Wait for the terminal signal
    pub async fn resolve(self) -> PushOutcome {
        self.outcome
            .await
            .unwrap_or_else(|_| PushOutcome::ConnectionError("listener stopped".to_string()))
    }

    /// Resolve and judge the outcome against the expectation
    pub async fn wait(self) -> Result<Option<PushEvent>, PushError> {
        let identity = self.identity.clone();
        let event_type = self.event_type.to_string();
        let expectation = self.expectation;

        match (expectation, self.resolve().await) {
            (_, PushOutcome::ConnectionError(reason)) => {
                Err(PushError::SubscriptionDisconnected(reason))
            }
            (Expectation::Push, PushOutcome::Matched(event)) => Ok(Some(event)),
            (Expectation::Push, PushOutcome::NotMatched) => {
                Err(PushError::ExpectedEventNotReceived {
                    identity,
                    event_type,
                })
            }
            (Expectation::NoPush, PushOutcome::Matched(_)) => {
                Err(PushError::UnexpectedEventReceived {
                    identity,
                    event_type,
                })
            }
            (Expectation::NoPush, PushOutcome::NotMatched) => Ok(None),
        }
    }
}

/// Wait for the expected event and decode its entity
pub async fn assert_push<T: serde::de::DeserializeOwned>(handle: WaitHandle) -> Result<T, PushError> {
    match handle.wait().await? {
        Some(event) => event.decode(),
        None => Err(PushError::Decode("no event to decode".to_string())),
    }
}

/// Succeed when the window elapses without a matching event
pub async fn assert_no_push(handle: WaitHandle) -> Result<(), PushError> {
    handle.wait().await.map(|_| ())
}
