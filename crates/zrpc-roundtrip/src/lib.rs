//! Bindings generated for `roundtrip.proto`, compiled next to the prost
//! messages of the same schema.
//!
//! The build script emits `roundtrip_client` and `roundtrip_server` as
//! siblings of [`pb`], which is where generated code looks for message types
//! by default.

/// prost messages of `roundtrip.proto`
pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/roundtrip.rs"));
}

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
