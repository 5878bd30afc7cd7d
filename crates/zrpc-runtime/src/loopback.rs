//! In-process transport.
//!
//! [`Loopback`] plays both ends of a session: generated servers register
//! handlers on it, generated clients query it through [`RpcClient`], and
//! publishers push samples to subscribers with [`Loopback::publish`]. Keys
//! match exactly; there is no wildcard routing.
//!
//! [`RpcClient`]: crate::RpcClient

use crate::keys;
use crate::status::{CallError, RpcStatus};
use crate::transport::{
    Query, RequestHandler, RpcChannel, SampleCallback, Subscriber, SubscriptionId,
};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Maximum number of handlers a single channel accepts
pub const MAX_QUERYABLES: usize = 16;

/// In-process request/reply and publish/subscribe session
pub struct Loopback {
    device_id: String,
    queryables: Mutex<BTreeMap<String, Arc<RequestHandler>>>,
    subscribers: Mutex<BTreeMap<SubscriptionId, (String, Arc<SampleCallback>)>>,
    next_id: AtomicU64,
}

impl Loopback {
    /// Creates a session whose server side answers as `device_id`
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            queryables: Mutex::new(BTreeMap::new()),
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the device id handlers are registered under
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the key expressions that currently have a handler
    pub fn registered_keys(&self) -> Vec<String> {
        self.queryables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Delivers `payload` to every subscriber of `key_expr`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, key_expr: &str, payload: &[u8]) -> usize {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking
        let targets: Vec<Arc<SampleCallback>> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(key, _)| key == key_expr)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        trace!(
            "publishing {} bytes on {} to {} subscriber(s)",
            payload.len(),
            key_expr,
            targets.len()
        );
        for callback in &targets {
            callback(payload);
        }
        targets.len()
    }
}

impl Query for Loopback {
    fn query(&self, key_expr: &str, payload: &[u8], _timeout: Duration) -> Result<Bytes, CallError> {
        let handler = self
            .queryables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key_expr)
            .cloned();

        let Some(handler) = handler else {
            debug!("no queryable on {}", key_expr);
            return Err(CallError::NoReply);
        };

        let mut sink = Vec::new();
        match handler(payload, &mut sink) {
            RpcStatus::Ok => Ok(Bytes::from(sink)),
            status => {
                warn!("handler on {} returned {}", key_expr, status);
                Err(CallError::reply(status.as_str()))
            }
        }
    }
}

impl RpcChannel for Loopback {
    fn register_handler(&self, service: &str, method: &str, handler: RequestHandler) -> bool {
        let key_expr = keys::rpc_key(&self.device_id, service, method);
        let mut queryables = self
            .queryables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if queryables.len() >= MAX_QUERYABLES && !queryables.contains_key(&key_expr) {
            error!("Maximum queryables reached, cannot register {}", key_expr);
            return false;
        }

        debug!("registered queryable: {}", key_expr);
        queryables.insert(key_expr, Arc::new(handler));
        true
    }
}

impl Subscriber for Loopback {
    fn subscribe(
        &self,
        key_expr: &str,
        callback: SampleCallback,
    ) -> Result<SubscriptionId, CallError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (key_expr.to_string(), Arc::new(callback)));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}
