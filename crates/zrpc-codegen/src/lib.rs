//! # zrpc-codegen
//!
//! Generates RPC bindings for a publish/subscribe transport from Protocol
//! Buffer schemas.
//!
//! This crate provides the core functionality for:
//! - Reading descriptors and custom options that `prost` cannot decode
//! - Deciding which messages need an explicit release step on the device
//! - Emitting client, server and UI modules that share one key scheme
//!
//! ## Architecture
//!
//! - [`descriptor`]: read-only schema model and the raw wire walker
//! - [`options`]: custom-option extraction by field number
//! - [`pointer`]: `.options` sidecar analysis
//! - [`emit`]: the client, server and UI emitters
//! - [`plugin`]: the protoc plugin driver
//! - [`config`]: generator settings and plugin parameter parsing
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use zrpc_codegen::{plugin, GeneratorConfig, Target};
//! use std::fs;
//!
//! // protoc --include_imports --descriptor_set_out=service.pb protos/service.proto
//! let data = fs::read("service.pb")?;
//!
//! let config = GeneratorConfig::new().targets([Target::Client, Target::Server]);
//! for unit in plugin::generate_from_descriptor_set(&data, &[], &config)? {
//!     println!("{}: {} bytes", unit.name, unit.content.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! The [`Emitter`] trait is the seam for additional targets; every emitter
//! reads the same [`EmitContext`].

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod descriptor;
pub mod emit;
pub mod error;
pub mod naming;
pub mod options;
pub mod plugin;
pub mod pointer;

// Re-export primary types for convenience
pub use config::{GeneratorConfig, Target};
pub use descriptor::{RawOptions, SchemaSet};
pub use emit::{EmitContext, Emitter, GeneratedFile};
pub use error::{Error, Result};
pub use options::{extract_string_option, OptionKey};
pub use pointer::PointerRegistry;
