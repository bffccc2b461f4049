//! Push notification assertions
//!
//! Lets a test body assert that a platform event does or does not arrive
//! within a bounded window.

mod event;
mod waiter;

pub use event::{
    ChannelSubscriber, EventType, PushEvent, Subscriber, SubscriberStatus, SubscriptionChannels,
    SubscriptionFeed,
};
pub use waiter::{
    assert_no_push, assert_push, Expectation, Listener, PushOutcome, WaitHandle,
    DEFAULT_NEGATIVE_TIMEOUT, DEFAULT_POSITIVE_TIMEOUT,
};
