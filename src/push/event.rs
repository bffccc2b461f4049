//! Push events and the subscription seam
//!
//! A [`Subscriber`] is whatever transport delivers platform notifications.
//! It exposes three channels once started: events, errors and status.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::error::PushError;
use crate::executor::Context;

/// Kind of change a push event describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::Delete => "delete",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification pushed by the platform
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Identity of the changed entity, e.g. `namespace`
    pub identity: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub entity: serde_json::Value,
}

impl PushEvent {
    pub fn new(identity: impl Into<String>, event_type: EventType, entity: serde_json::Value) -> Self {
        Self {
            identity: identity.into(),
            event_type,
            entity,
        }
    }

    /// Decode the entity carried by the event
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PushError> {
        serde_json::from_value(self.entity.clone()).map_err(|e| PushError::Decode(e.to_string()))
    }
}

/// Connection status reported by a subscriber
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriberStatus {
    /// First successful connection
    Connected,
    Reconnected,
    /// Connection lost for good
    Disconnected,
}

/// Receiving ends handed out by a started subscriber
#[derive(Debug)]
pub struct SubscriptionChannels {
    pub events: mpsc::Receiver<PushEvent>,
    pub errors: mpsc::Receiver<String>,
    pub status: mpsc::Receiver<SubscriberStatus>,
}

/// Transport delivering push events
pub trait Subscriber: Send {
    /// Start the subscription; it must stop once `ctx` is done
    fn start(&mut self, ctx: Context) -> SubscriptionChannels;
}

/// Sending ends of a [`ChannelSubscriber`]
#[derive(Clone, Debug)]
pub struct SubscriptionFeed {
    pub events: mpsc::Sender<PushEvent>,
    pub errors: mpsc::Sender<String>,
    pub status: mpsc::Sender<SubscriberStatus>,
}

/// Subscriber fed by hand through a [`SubscriptionFeed`]
///
/// Bridges any transport that can push into channels, and doubles as a test
/// double.
#[derive(Debug)]
pub struct ChannelSubscriber {
    channels: Option<SubscriptionChannels>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Self, SubscriptionFeed) {
        let (events_tx, events) = mpsc::channel(capacity);
        let (errors_tx, errors) = mpsc::channel(capacity);
        let (status_tx, status) = mpsc::channel(capacity);

        (
            Self {
                channels: Some(SubscriptionChannels {
                    events,
                    errors,
                    status,
                }),
            },
            SubscriptionFeed {
                events: events_tx,
                errors: errors_tx,
                status: status_tx,
            },
        )
    }
}

impl Subscriber for ChannelSubscriber {
    fn start(&mut self, _ctx: Context) -> SubscriptionChannels {
        self.channels.take().unwrap_or_else(|| {
            // Restarting hands out channels that are already closed.
            let (_, events) = mpsc::channel(1);
            let (_, errors) = mpsc::channel(1);
            let (_, status) = mpsc::channel(1);
            SubscriptionChannels {
                events,
                errors,
                status,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Namespace {
        name: String,
    }

    #[test]
    fn test_event_wire_format() {
        let event: PushEvent = serde_json::from_value(json!({
            "identity": "namespace",
            "type": "create",
            "entity": {"name": "/acme/ns"}
        }))
        .unwrap();

        assert_eq!(event.event_type, EventType::Create);
        assert_eq!(
            event.decode::<Namespace>().unwrap(),
            Namespace {
                name: "/acme/ns".into()
            }
        );
    }

    #[test]
    fn test_decode_mismatch() {
        let event = PushEvent::new("namespace", EventType::Delete, json!({"id": 3}));
        assert!(matches!(event.decode::<Namespace>(), Err(PushError::Decode(_))));
    }

    #[test]
    fn test_restart_gives_closed_channels() {
        let (mut subscriber, _feed) = ChannelSubscriber::new(4);
        let _first = subscriber.start(Context::background());
        let mut second = subscriber.start(Context::background());
        assert!(second.events.try_recv().is_err());
    }
}
