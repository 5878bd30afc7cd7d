//! Raw custom-option extraction.
//!
//! A custom option such as `option (zenoh_key) = "/telemetry/env";` is an
//! extension field of `MessageOptions`. Without the extension's own schema
//! there is no typed accessor, so the value is read by scanning the
//! serialized options for the field number.
//!
//! The field number is resolved once per run ([`OptionKey::resolve`]) and
//! passed explicitly to every extraction.

use crate::descriptor::wire::{Fields, WireType};
use crate::descriptor::{MessageDef, SchemaSet};
use tracing::{debug, trace};

/// Field number assumed when no key extension is declared
pub const DEFAULT_OPTION_FIELD: u32 = 50001;

/// Name suffix of the extension that declares the key option
pub const KEY_EXTENSION_SUFFIX: &str = "zenoh_key";

/// Field number of the string-valued key option for one generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionKey(u32);

impl Default for OptionKey {
    fn default() -> Self {
        Self(DEFAULT_OPTION_FIELD)
    }
}

impl OptionKey {
    /// Wraps an explicit field number
    pub fn new(field_number: u32) -> Self {
        Self(field_number)
    }

    /// Resolves the key from the first extension named `*zenoh_key` in any
    /// file of the request, falling back to [`DEFAULT_OPTION_FIELD`].
    pub fn resolve(schema: &SchemaSet) -> Self {
        let declared = schema
            .files()
            .iter()
            .flat_map(|file| file.extensions.iter())
            .find(|ext| ext.name.ends_with(KEY_EXTENSION_SUFFIX));

        match declared {
            Some(ext) => {
                debug!("found {} extension with field number {}", ext.name, ext.number);
                Self(ext.number)
            }
            None => Self::default(),
        }
    }

    /// The field number
    pub fn field_number(&self) -> u32 {
        self.0
    }

    /// Reads the key option of a message
    pub fn value_for(&self, message: &MessageDef) -> Option<String> {
        extract_string_option(&message.options, self.0)
    }
}

/// Extracts the string value of the option at `field_number`.
///
/// Scans the fields in order. The first occurrence of `field_number` decides:
/// a length-delimited value is returned as UTF-8, any other wire type yields
/// `None`. Exhausted or malformed buffers and invalid UTF-8 also yield `None`.
pub fn extract_string_option(options: &[u8], field_number: u32) -> Option<String> {
    for field in Fields::new(options) {
        let field = match field {
            Ok(field) => field,
            Err(e) => {
                debug!("stopped scanning options for field {}: {}", field_number, e);
                return None;
            }
        };

        if field.number != field_number {
            trace!("skipping field {} ({:?})", field.number, field.wire_type);
            continue;
        }

        if field.wire_type != WireType::Len {
            debug!(
                "option field {} has wire type {:?}, expected length-delimited",
                field_number, field.wire_type
            );
            return None;
        }

        return match std::str::from_utf8(field.value) {
            Ok(value) => Some(value.to_string()),
            Err(e) => {
                debug!("option field {} is not UTF-8: {}", field_number, e);
                None
            }
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::wire::{encode_len_field, encode_varint};
    use crate::descriptor::RawOptions;
    use prost_types::{FieldDescriptorProto, FileDescriptorProto};

    fn with_string(field_number: u32, value: &str) -> Vec<u8> {
        // deprecated = false first, so the scan has to skip a field
        let mut out = vec![0x18, 0x00];
        encode_len_field(field_number, value.as_bytes(), &mut out);
        out
    }

    #[test]
    fn test_extracts_matching_string() {
        let options = with_string(50001, "X");
        assert_eq!(extract_string_option(&options, 50001).as_deref(), Some("X"));
    }

    #[test]
    fn test_other_field_number_is_none() {
        let options = with_string(50001, "X");
        assert_eq!(extract_string_option(&options, 50002), None);
    }

    #[test]
    fn test_varint_at_target_is_none() {
        let mut options = Vec::new();
        encode_varint(50001 << 3, &mut options);
        encode_varint(7, &mut options);
        assert_eq!(extract_string_option(&options, 50001), None);
    }

    #[test]
    fn test_skips_every_wire_type() {
        let mut options = Vec::new();
        // field 1 varint, field 2 fixed64, field 3 LEN, field 4 fixed32
        options.extend_from_slice(&[0x08, 0xAC, 0x02]);
        options.extend_from_slice(&[0x11, 1, 2, 3, 4, 5, 6, 7, 8]);
        encode_len_field(3, b"skip me", &mut options);
        options.extend_from_slice(&[0x25, 1, 2, 3, 4]);
        encode_len_field(50001, b"/telemetry/env", &mut options);

        assert_eq!(
            extract_string_option(&options, 50001).as_deref(),
            Some("/telemetry/env")
        );
    }

    #[test]
    fn test_malformed_buffers_are_none() {
        assert_eq!(extract_string_option(&[], 50001), None);
        // LEN field whose length runs past the end
        assert_eq!(extract_string_option(&[0x8A, 0xB5, 0x18, 0x05, b'a'], 50001), None);
        // invalid UTF-8 payload
        let mut options = Vec::new();
        encode_len_field(50001, &[0xFF, 0xFE], &mut options);
        assert_eq!(extract_string_option(&options, 50001), None);
    }

    fn file_with_extension(name: &str, number: i32) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("options.proto".to_string()),
            extension: vec![FieldDescriptorProto {
                name: Some(name.to_string()),
                number: Some(number),
                extendee: Some(".google.protobuf.MessageOptions".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_option_key() {
        let none = SchemaSet::new(&[], &RawOptions::new());
        assert_eq!(OptionKey::resolve(&none).field_number(), DEFAULT_OPTION_FIELD);

        let declared = SchemaSet::new(
            &[file_with_extension("zenoh_key", 50123)],
            &RawOptions::new(),
        );
        assert_eq!(OptionKey::resolve(&declared).field_number(), 50123);

        let unrelated = SchemaSet::new(
            &[file_with_extension("nanopb_opts", 1010)],
            &RawOptions::new(),
        );
        assert_eq!(OptionKey::resolve(&unrelated), OptionKey::default());
    }
}
