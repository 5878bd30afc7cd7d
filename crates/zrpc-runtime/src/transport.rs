//! Transport traits that generated bindings are written against.
//!
//! The layering follows the key-expression scheme:
//!
//! - [`Query`] is the raw request/reply primitive of a session, addressed by key expression
//! - [`RpcTransport`] is what generated clients call, addressed by service and method
//! - [`RpcClient`] bridges the two by building the call key from its device id
//! - [`RpcChannel`] is what generated servers register handlers on
//! - [`Subscriber`] delivers raw samples for telemetry and log topics

use crate::keys;
use crate::status::{CallError, RpcStatus};
use bytes::Bytes;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Call timeout used by generated clients unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Server-side handler: request bytes in, response written to the sink
pub type RequestHandler = Box<dyn Fn(&[u8], &mut Vec<u8>) -> RpcStatus + Send + Sync>;

/// Callback invoked with the raw payload of each delivered sample
pub type SampleCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Handle for an active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Raw request/reply primitive of a session.
///
/// Implementations send one payload, wait at most `timeout` and return the
/// first reply. Zero replies must map to [`CallError::NoReply`], an explicit
/// error reply to [`CallError::Reply`].
pub trait Query: Send + Sync {
    /// Issue a query on `key_expr` and return the first reply payload
    fn query(&self, key_expr: &str, payload: &[u8], timeout: Duration) -> Result<Bytes, CallError>;
}

/// Service/method addressed call used by generated clients
pub trait RpcTransport: Send + Sync {
    /// Perform a blocking call and return the raw reply payload
    fn call(
        &self,
        service: &str,
        method: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Bytes, CallError>;
}

/// Routing channel that generated servers register their handlers on
pub trait RpcChannel: Send + Sync {
    /// Register `handler` for `service`/`method`.
    ///
    /// Returns false when the channel refused the registration.
    fn register_handler(&self, service: &str, method: &str, handler: RequestHandler) -> bool;
}

/// Publish/subscribe side of a session
pub trait Subscriber: Send + Sync {
    /// Subscribe `callback` to `key_expr`
    fn subscribe(&self, key_expr: &str, callback: SampleCallback)
        -> Result<SubscriptionId, CallError>;

    /// Drop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

impl<T: Query + ?Sized> Query for Arc<T> {
    fn query(&self, key_expr: &str, payload: &[u8], timeout: Duration) -> Result<Bytes, CallError> {
        (**self).query(key_expr, payload, timeout)
    }
}

impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    fn call(
        &self,
        service: &str,
        method: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Bytes, CallError> {
        (**self).call(service, method, request, timeout)
    }
}

impl<T: RpcChannel + ?Sized> RpcChannel for Arc<T> {
    fn register_handler(&self, service: &str, method: &str, handler: RequestHandler) -> bool {
        (**self).register_handler(service, method, handler)
    }
}

impl<T: Subscriber + ?Sized> Subscriber for Arc<T> {
    fn subscribe(
        &self,
        key_expr: &str,
        callback: SampleCallback,
    ) -> Result<SubscriptionId, CallError> {
        (**self).subscribe(key_expr, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }
}

/// Device-aware call transport.
///
/// Builds `<device-id>/rpc/<Service>/<Method>` for every call. The device id
/// can be changed at any time, so a UI can re-target a running client.
#[derive(Debug)]
pub struct RpcClient<Q> {
    session: Q,
    device_id: RwLock<String>,
}

impl<Q: Query> RpcClient<Q> {
    /// Creates a client over `session` targeting `device_id`
    pub fn new(session: Q, device_id: impl Into<String>) -> Self {
        Self {
            session,
            device_id: RwLock::new(device_id.into()),
        }
    }

    /// Sets or clears (empty string) the target device id
    pub fn set_device_id(&self, device_id: impl Into<String>) {
        *self
            .device_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = device_id.into();
    }

    /// Returns the current target device id
    pub fn device_id(&self) -> String {
        self.device_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the underlying session
    pub fn session(&self) -> &Q {
        &self.session
    }
}

impl<Q: Query> RpcTransport for RpcClient<Q> {
    fn call(
        &self,
        service: &str,
        method: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Bytes, CallError> {
        let key_expr = keys::rpc_key(&self.device_id(), service, method);
        debug!("calling {} ({} bytes)", key_expr, request.len());

        self.session
            .query(&key_expr, request, timeout)
            .map_err(|e| {
                warn!("RPC call on {} failed: {}", key_expr, e);
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the key of every query and answers with the key itself
    #[derive(Default)]
    struct EchoKey {
        seen: Mutex<Vec<String>>,
    }

    impl Query for EchoKey {
        fn query(
            &self,
            key_expr: &str,
            _payload: &[u8],
            _timeout: Duration,
        ) -> Result<Bytes, CallError> {
            self.seen.lock().unwrap().push(key_expr.to_string());
            Ok(Bytes::copy_from_slice(key_expr.as_bytes()))
        }
    }

    #[test]
    fn test_client_builds_device_key() {
        let client = RpcClient::new(EchoKey::default(), "dev1");
        let reply = client
            .call("DeviceService", "SetLed", &[], DEFAULT_TIMEOUT)
            .unwrap();
        assert_eq!(&reply[..], b"dev1/rpc/DeviceService/SetLed");
    }

    #[test]
    fn test_client_retargets() {
        let client = RpcClient::new(EchoKey::default(), "dev1");
        client.set_device_id("");
        client
            .call("DeviceService", "SetLed", &[], DEFAULT_TIMEOUT)
            .unwrap();
        assert_eq!(client.device_id(), "");
        assert_eq!(
            client.session().seen.lock().unwrap().as_slice(),
            ["rpc/DeviceService/SetLed".to_string()]
        );
    }
}
