//! Delivery helpers used on the callback paths of generated code.
//!
//! Subscriber callbacks run on whatever thread the session delivers on. A
//! payload that fails to decode, or a callback that panics, is logged and
//! swallowed here so later samples keep flowing.

use crate::keys;
use crate::status::CallError;
use crate::transport::{Subscriber, SubscriptionId};
use prost::Message;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info};

/// Releases heap memory held by a decoded or encoded message.
///
/// Generated server handlers call this on every exit path for messages whose
/// embedded encoding allocates, keeping handler structure identical to the
/// device-side code. Clearing drops the owned buffers.
pub fn release<M: Message>(message: &mut M) {
    message.clear();
}

/// Decodes `payload` as `M` and hands it to `callback`.
///
/// Returns false when decoding failed or the callback panicked; neither is
/// propagated to the caller.
pub fn deliver<M, F>(type_name: &str, payload: &[u8], callback: &F) -> bool
where
    M: Message + Default,
    F: Fn(M) + ?Sized,
{
    let message = match M::decode(payload) {
        Ok(message) => message,
        Err(e) => {
            error!("Failed to parse {}: {}", type_name, e);
            return false;
        }
    };

    isolate(type_name, || callback(message))
}

fn isolate(what: &str, f: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            error!("{} callback panicked", what);
            false
        }
    }
}

/// Subscriber for the free-text device log feed (`<device-id>/log`)
pub struct LogSubscriber<S: Subscriber> {
    subscriber: S,
    device_id: String,
    subscription: Option<SubscriptionId>,
}

impl<S: Subscriber> LogSubscriber<S> {
    /// Creates a log subscriber for `device_id`
    pub fn new(subscriber: S, device_id: impl Into<String>) -> Self {
        Self {
            subscriber,
            device_id: device_id.into(),
            subscription: None,
        }
    }

    /// Returns the topic this subscriber listens on
    pub fn key_expr(&self) -> String {
        keys::log_key(&self.device_id)
    }

    /// Subscribes `callback` to decoded log lines.
    ///
    /// Payloads are raw UTF-8 with no envelope; invalid UTF-8 is logged and dropped.
    /// A previous subscription held by this subscriber is dropped first.
    pub fn subscribe<F>(&mut self, callback: F) -> Result<(), CallError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.unsubscribe();

        let key_expr = self.key_expr();
        info!("Subscribing to logs: {}", key_expr);

        let id = self.subscriber.subscribe(
            &key_expr,
            Box::new(move |data: &[u8]| match std::str::from_utf8(data) {
                Ok(line) => {
                    let line = line.to_string();
                    isolate("log", || callback(line));
                }
                Err(e) => error!("Failed to decode log message: {}", e),
            }),
        )?;
        self.subscription = Some(id);
        Ok(())
    }

    /// Stops delivery of log lines
    pub fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.subscriber.unsubscribe(id);
            info!("Unsubscribed from logs");
        }
    }
}
