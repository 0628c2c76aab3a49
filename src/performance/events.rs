//! Subscriber registry for governor and monitor events
//!
//! Subscribers are notified in subscription order. A subscriber that returns
//! an error or panics is reported to the `ErrorReporter` and the remaining
//! subscribers are still notified.

use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use uuid::Uuid;

pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;
pub type SubscriberResult = Result<(), SubscriberError>;

type Subscriber<E> = Box<dyn FnMut(&E) -> SubscriberResult>;

/// Opaque handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where subscriber failures go
pub trait ErrorReporter: Send + Sync {
    fn report(&self, channel: &str, handle: SubscriptionHandle, message: &str);
}

/// Logs subscriber failures and carries on
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, channel: &str, handle: SubscriptionHandle, message: &str) {
        tracing::error!("Subscriber {} on '{}' failed: {}", handle, channel, message);
    }
}

pub struct EventBus<E> {
    channel: &'static str,
    subscribers: IndexMap<Uuid, Subscriber<E>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl<E> EventBus<E> {
    pub fn new(channel: &'static str, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            channel,
            subscribers: IndexMap::new(),
            reporter,
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionHandle
    where
        F: FnMut(&E) -> SubscriberResult + 'static,
    {
        let id = Uuid::new_v4();
        self.subscribers.insert(id, Box::new(callback));
        SubscriptionHandle(id)
    }

    /// Returns `false` when the handle was not registered
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscribers.shift_remove(&handle.0).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver `event` to every subscriber; returns how many succeeded.
    pub fn notify(&mut self, event: &E) -> usize {
        let mut delivered = 0;
        for (id, callback) in self.subscribers.iter_mut() {
            let handle = SubscriptionHandle(*id);
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => self.reporter.report(self.channel, handle, &e.to_string()),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    self.reporter.report(self.channel, handle, &message);
                }
            }
        }
        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
