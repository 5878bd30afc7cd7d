//! Key-expression scheme shared by every generated binding.
//!
//! All addresses are built by plain concatenation:
//!
//! - call: `<device-id>/rpc/<Service>/<Method>`, or `rpc/<Service>/<Method>` without a device id
//! - telemetry: `<device-id><suffix>`, where the suffix starts with `/`
//! - device logs: `<device-id>/log`

/// Path segment that separates the device id from the service name
pub const RPC_SEGMENT: &str = "rpc";

/// Suffix of the device log topic
pub const LOG_SUFFIX: &str = "/log";

/// Prefix of default telemetry suffixes
pub const TELEMETRY_PREFIX: &str = "/telemetry/";

/// Builds the key expression a call to `service`/`method` is routed on.
///
/// An empty `device_id` addresses whichever responder serves the bare key.
pub fn rpc_key(device_id: &str, service: &str, method: &str) -> String {
    if device_id.is_empty() {
        format!("{}/{}/{}", RPC_SEGMENT, service, method)
    } else {
        format!("{}/{}/{}/{}", device_id, RPC_SEGMENT, service, method)
    }
}

/// Builds a telemetry topic from a device id and a resolved suffix
pub fn telemetry_key(device_id: &str, suffix: &str) -> String {
    format!("{}{}", device_id, suffix)
}

/// Builds the device log topic
pub fn log_key(device_id: &str) -> String {
    format!("{}{}", device_id, LOG_SUFFIX)
}
