//! Status and error types shared by generated clients and servers.
//!
//! Server handlers return an [`RpcStatus`]. Transports surface failed calls
//! as [`CallError`], and generated clients fold both into an [`RpcResponse`]
//! so every call site sees an explicit success or failure marker.

use std::fmt;
use thiserror::Error;

/// Outcome of a server-side handler invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcStatus {
    /// The request was handled and the response encoded
    Ok,
    /// No reply arrived in time
    Timeout,
    /// The response could not be encoded into the outbound sink
    EncodeError,
    /// The request bytes could not be decoded
    DecodeError,
    /// The transport failed to carry the call
    TransportError,
    /// No handler is registered for the key expression
    NotFound,
}

impl RpcStatus {
    /// Returns true for [`RpcStatus::Ok`]
    pub fn is_ok(&self) -> bool {
        matches!(self, RpcStatus::Ok)
    }

    /// Returns the canonical upper-case name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcStatus::Ok => "OK",
            RpcStatus::Timeout => "TIMEOUT",
            RpcStatus::EncodeError => "ENCODE_ERROR",
            RpcStatus::DecodeError => "DECODE_ERROR",
            RpcStatus::TransportError => "TRANSPORT_ERROR",
            RpcStatus::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a request/reply call as seen by the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CallError {
    /// Zero replies arrived within the timeout
    #[error("no reply received")]
    NoReply,

    /// The responder answered with an explicit error reply
    #[error("reply error: {0}")]
    Reply(String),

    /// The transport could not issue the query
    #[error("transport error: {0}")]
    Transport(String),
}

impl CallError {
    /// Creates an explicit error reply
    pub fn reply(msg: impl Into<String>) -> Self {
        Self::Reply(msg.into())
    }

    /// Creates a transport failure
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Success marker returned by every generated client call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RpcResponse {
    /// Whether the call succeeded
    pub success: bool,
    /// Error text when the call failed
    pub error: Option<String>,
}

impl RpcResponse {
    /// A successful response
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed response carrying the error text
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<&CallError> for RpcResponse {
    fn from(err: &CallError) -> Self {
        Self::failed(err.to_string())
    }
}
