//! # zrpc-runtime
//!
//! Contracts shared by the bindings that `protoc-gen-zrpc` emits.
//!
//! Generated clients, servers and UI surfaces never talk to a concrete
//! publish/subscribe session. They are written against the traits in
//! [`transport`] and report outcomes with the types in [`status`], so the
//! same generated module runs over any session that can route a query by
//! key expression.
//!
//! ## Modules
//!
//! - [`keys`]: the key-expression scheme (`<device>/rpc/<Service>/<Method>`, telemetry, logs)
//! - [`status`]: handler status codes, call errors and the client-facing response marker
//! - [`transport`]: transport traits and the device-aware [`RpcClient`]
//! - [`delivery`]: isolated telemetry delivery, device log feed and the release step
//! - [`input`]: conversions used by generated UI forms
//! - [`loopback`]: an in-process transport for tests and local wiring
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use zrpc_runtime::{Loopback, RpcChannel, RpcClient, RpcStatus, RpcTransport};
//!
//! let device = Arc::new(Loopback::new("dev1"));
//! device.register_handler(
//!     "DeviceService",
//!     "Ping",
//!     Box::new(|request: &[u8], sink: &mut Vec<u8>| {
//!         sink.extend_from_slice(request);
//!         RpcStatus::Ok
//!     }),
//! );
//!
//! let client = RpcClient::new(Arc::clone(&device), "dev1");
//! let reply = client.call("DeviceService", "Ping", b"hi", Duration::from_millis(100))?;
//! assert_eq!(&reply[..], b"hi");
//! # Ok::<(), zrpc_runtime::CallError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod delivery;
pub mod input;
pub mod keys;
pub mod loopback;
pub mod status;
pub mod transport;

pub use delivery::{deliver, release, LogSubscriber};
pub use loopback::Loopback;
pub use status::{CallError, RpcResponse, RpcStatus};
pub use transport::{
    Query, RequestHandler, RpcChannel, RpcClient, RpcTransport, SampleCallback, Subscriber,
    SubscriptionId, DEFAULT_TIMEOUT,
};

// Generated code encodes and logs through these re-exports.
#[doc(hidden)]
pub use prost;
#[doc(hidden)]
pub use tracing;
