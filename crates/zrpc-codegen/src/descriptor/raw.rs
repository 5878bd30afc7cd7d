//! Raw message-options retention.
//!
//! Custom options are extension fields of `MessageOptions`. `prost` decodes
//! descriptors into plain structs and drops every field it does not know,
//! so the option bytes are collected here straight from the encoded request
//! before they are lost.
//!
//! Paths walked (field numbers):
//! - `CodeGeneratorRequest.proto_file` (15) or `FileDescriptorSet.file` (1)
//! - `FileDescriptorProto.package` (2) and `.message_type` (4)
//! - `DescriptorProto.name` (1), `.nested_type` (3) and `.options` (7)

use super::wire::{Fields, WireType};
use crate::error::Result;
use std::collections::HashMap;
use tracing::trace;

/// `CodeGeneratorRequest.proto_file`
pub const REQUEST_PROTO_FILE: u32 = 15;
/// `FileDescriptorSet.file`
pub const DESCRIPTOR_SET_FILE: u32 = 1;

const FILE_PACKAGE: u32 = 2;
const FILE_MESSAGE_TYPE: u32 = 4;
const MESSAGE_NAME: u32 = 1;
const MESSAGE_NESTED_TYPE: u32 = 3;
const MESSAGE_OPTIONS: u32 = 7;

/// Serialized `MessageOptions` per qualified message name (`.pkg.Msg`)
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    by_message: HashMap<String, Vec<u8>>,
}

impl RawOptions {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects option blobs from an encoded `CodeGeneratorRequest`
    pub fn from_request(data: &[u8]) -> Result<Self> {
        Self::collect(data, REQUEST_PROTO_FILE)
    }

    /// Collects option blobs from an encoded `FileDescriptorSet`
    pub fn from_descriptor_set(data: &[u8]) -> Result<Self> {
        Self::collect(data, DESCRIPTOR_SET_FILE)
    }

    fn collect(data: &[u8], file_field: u32) -> Result<Self> {
        let mut table = Self::new();
        for field in Fields::new(data) {
            let field = field?;
            if field.number == file_field && field.wire_type == WireType::Len {
                collect_file(field.value, &mut table.by_message)?;
            }
        }
        trace!("retained options for {} message(s)", table.by_message.len());
        Ok(table)
    }

    /// Records the options blob of a message
    pub fn insert(&mut self, qualified_name: impl Into<String>, options: Vec<u8>) {
        self.by_message.insert(qualified_name.into(), options);
    }

    /// Returns the options blob of a message, if it had one
    pub fn get(&self, qualified_name: &str) -> Option<&[u8]> {
        self.by_message.get(qualified_name).map(Vec::as_slice)
    }

    /// Number of messages with retained options
    pub fn len(&self) -> usize {
        self.by_message.len()
    }

    /// Returns true if no options were retained
    pub fn is_empty(&self) -> bool {
        self.by_message.is_empty()
    }
}

fn collect_file(data: &[u8], table: &mut HashMap<String, Vec<u8>>) -> Result<()> {
    // The package may be encoded after the messages, so resolve it first
    let mut package = String::new();
    for field in Fields::new(data) {
        let field = field?;
        if field.number == FILE_PACKAGE && field.wire_type == WireType::Len {
            package = String::from_utf8_lossy(field.value).into_owned();
        }
    }

    let scope = if package.is_empty() {
        String::new()
    } else {
        format!(".{}", package)
    };

    for field in Fields::new(data) {
        let field = field?;
        if field.number == FILE_MESSAGE_TYPE && field.wire_type == WireType::Len {
            collect_message(field.value, &scope, table)?;
        }
    }
    Ok(())
}

fn collect_message(data: &[u8], scope: &str, table: &mut HashMap<String, Vec<u8>>) -> Result<()> {
    let mut name = String::new();
    let mut options = Vec::new();
    let mut nested = Vec::new();

    for field in Fields::new(data) {
        let field = field?;
        if field.wire_type != WireType::Len {
            continue;
        }
        match field.number {
            MESSAGE_NAME => name = String::from_utf8_lossy(field.value).into_owned(),
            // Repeated occurrences merge, which for encoded messages is concatenation
            MESSAGE_OPTIONS => options.extend_from_slice(field.value),
            MESSAGE_NESTED_TYPE => nested.push(field.value),
            _ => {}
        }
    }

    let qualified = format!("{}.{}", scope, name);
    for child in nested {
        collect_message(child, &qualified, table)?;
    }
    if !options.is_empty() {
        table.insert(qualified, options);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::wire::encode_len_field;
    use super::*;

    fn message(name: &str, options: &[u8], nested: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_len_field(MESSAGE_NAME, name.as_bytes(), &mut out);
        for child in nested {
            encode_len_field(MESSAGE_NESTED_TYPE, child, &mut out);
        }
        if !options.is_empty() {
            encode_len_field(MESSAGE_OPTIONS, options, &mut out);
        }
        out
    }

    #[test]
    fn test_collects_top_level_and_nested_options() {
        let inner = message("Inner", &[0x08, 0x01], &[]);
        let outer = message("Outer", &[0x10, 0x02], &[inner]);

        let mut file = Vec::new();
        encode_len_field(FILE_MESSAGE_TYPE, &outer, &mut file);
        // Package after the messages on purpose
        encode_len_field(FILE_PACKAGE, b"practice.rpc", &mut file);

        let mut request = Vec::new();
        encode_len_field(REQUEST_PROTO_FILE, &file, &mut request);

        let table = RawOptions::from_request(&request).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(".practice.rpc.Outer"), Some(&[0x10, 0x02][..]));
        assert_eq!(table.get(".practice.rpc.Outer.Inner"), Some(&[0x08, 0x01][..]));
    }

    #[test]
    fn test_split_options_are_concatenated() {
        let mut msg = message("Split", &[0x08, 0x01], &[]);
        encode_len_field(MESSAGE_OPTIONS, &[0x10, 0x02], &mut msg);

        let mut file = Vec::new();
        encode_len_field(FILE_MESSAGE_TYPE, &msg, &mut file);
        let mut set = Vec::new();
        encode_len_field(DESCRIPTOR_SET_FILE, &file, &mut set);

        let table = RawOptions::from_descriptor_set(&set).unwrap();
        assert_eq!(table.get(".Split"), Some(&[0x08, 0x01, 0x10, 0x02][..]));
    }

    #[test]
    fn test_malformed_request_is_an_error() {
        assert!(RawOptions::from_request(&[0x7A, 0x09, 0x01]).is_err());
    }
}
