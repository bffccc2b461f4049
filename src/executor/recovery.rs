//! Panic recovery boundary
//!
//! Futures wrapped with [`guard`] never unwind past the wrapper: a panic
//! raised while polling them is turned into a [`Recovered`] value. The panic
//! hook captures a backtrace for panics raised inside a guard and stays quiet
//! for them; panics elsewhere go to the previously installed hook.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{self, Poll};

use crate::assert::AssertionFailure;

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Install the process-wide panic hook. Idempotent.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            if info.payload().is::<AssertionFailure>() {
                return;
            }
            let stack = Backtrace::force_capture().to_string();
            LAST_STACK.with(|s| *s.borrow_mut() = Some(stack));
        }));
    });
}

/// A panic caught at the recovery boundary
#[derive(Debug)]
pub enum Recovered {
    Assertion(AssertionFailure),
    Panic {
        message: String,
        stack: Option<String>,
    },
}

impl Recovered {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let stack = LAST_STACK.with(|s| s.borrow_mut().take());

        match payload.downcast::<AssertionFailure>() {
            Ok(failure) => Recovered::Assertion(*failure),
            Err(payload) => {
                let message = if let Some(msg) = payload.downcast_ref::<&str>() {
                    (*msg).to_string()
                } else if let Some(msg) = payload.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                Recovered::Panic { message, stack }
            }
        }
    }
}

/// Future adapter catching panics raised while polling the inner future
#[must_use = "futures do nothing unless polled"]
pub struct Guarded<F> {
    inner: F,
}

/// Wrap `future` in a recovery boundary
pub fn guard<F: Future + Unpin>(future: F) -> Guarded<F> {
    Guarded { inner: future }
}

impl<F: Future + Unpin> Future for Guarded<F> {
    type Output = Result<F::Output, Recovered>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.inner;

        GUARD_DEPTH.with(|d| d.set(d.get() + 1));
        let polled = panic::catch_unwind(AssertUnwindSafe(|| Pin::new(inner).poll(cx)));
        GUARD_DEPTH.with(|d| d.set(d.get() - 1));

        match polled {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Err(payload) => Poll::Ready(Err(Recovered::from_payload(payload))),
        }
    }
}
