//! Low-level protobuf wire format walking.
//!
//! `prost` drops unknown fields when decoding, and custom options live in
//! exactly those fields. This module walks raw wire data so the descriptor
//! model can keep option blobs and the extractor can read them.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)

use crate::error::{Error, Result};

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::invalid_wire_format(
                0,
                format!("unknown wire type: {}", value),
            )),
        }
    }
}

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_VALID_NUMBER: u32 = 536_870_911;

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= 10 {
            // Varints are at most 10 bytes for a 64-bit value
            return Err(Error::invalid_wire_format(i, "varint longer than 10 bytes"));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::invalid_wire_format(data.len(), "truncated varint"))
}

/// Encode a varint, appending it to `out`
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Append a length-delimited field to `out`
pub fn encode_len_field(field_number: u32, value: &[u8], out: &mut Vec<u8>) {
    encode_varint(((field_number as u64) << 3) | WireType::Len as u64, out);
    encode_varint(value.len() as u64, out);
    out.extend_from_slice(value);
}

/// A single field borrowed from a wire buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    /// Field number from the tag
    pub number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Value bytes: the payload for LEN fields (without the length prefix),
    /// the encoded bytes for the other wire types, empty for group markers
    pub value: &'a [u8],
}

/// Read one field from the start of `data`.
///
/// Returns the field and the total bytes consumed (tag and value).
pub fn read_field(data: &[u8]) -> Result<(RawField<'_>, usize)> {
    if data.is_empty() {
        return Err(Error::invalid_wire_format(0, "empty data"));
    }

    // Decode the tag (varint containing field number and wire type)
    let (tag, tag_len) = decode_varint(data)
        .map_err(|_| Error::invalid_wire_format(0, "failed to decode field tag"))?;

    let wire_type = WireType::try_from((tag & 0x07) as u8)?;
    let field_number = (tag >> 3) as u32;

    if field_number == 0 || (tag >> 3) > MAX_VALID_NUMBER as u64 {
        return Err(Error::invalid_wire_format(
            0,
            format!("invalid field number {}", tag >> 3),
        ));
    }

    let rest = &data[tag_len..];
    let (value, value_len) = match wire_type {
        WireType::Varint => {
            let (_, varint_len) = decode_varint(rest).map_err(|_| {
                Error::invalid_wire_format(tag_len, "failed to decode varint value")
            })?;
            (&rest[..varint_len], varint_len)
        }
        WireType::I64 => fixed(rest, 8, tag_len)?,
        WireType::Len => {
            let (length, length_varint_len) = decode_varint(rest).map_err(|_| {
                Error::invalid_wire_format(tag_len, "failed to decode length prefix")
            })?;

            let end = usize::try_from(length)
                .ok()
                .and_then(|len| len.checked_add(length_varint_len))
                .filter(|&end| end <= rest.len())
                .ok_or_else(|| {
                    Error::invalid_wire_format(
                        tag_len,
                        format!(
                            "not enough bytes for LEN field (need {}, have {})",
                            length,
                            rest.len() - length_varint_len
                        ),
                    )
                })?;
            (&rest[length_varint_len..end], end)
        }
        // Group markers carry no payload of their own
        WireType::StartGroup | WireType::EndGroup => (&rest[..0], 0),
        WireType::I32 => fixed(rest, 4, tag_len)?,
    };

    Ok((
        RawField {
            number: field_number,
            wire_type,
            value,
        },
        tag_len + value_len,
    ))
}

fn fixed(rest: &[u8], width: usize, offset: usize) -> Result<(&[u8], usize)> {
    if rest.len() < width {
        return Err(Error::invalid_wire_format(
            offset,
            format!("not enough bytes for {}-byte fixed value", width),
        ));
    }
    Ok((&rest[..width], width))
}

/// Iterator over the fields of a wire buffer.
///
/// Yields an error once and then stops when the buffer is malformed.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    data: &'a [u8],
    position: usize,
    failed: bool,
}

impl<'a> Fields<'a> {
    /// Creates an iterator over `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<RawField<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.data.len() {
            return None;
        }

        let data: &'a [u8] = self.data;
        match read_field(&data[self.position..]) {
            Ok((field, len)) => {
                self.position += len;
                Some(Ok(field))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(match e {
                    Error::InvalidWireFormat { offset, details } => {
                        Error::invalid_wire_format(self.position + offset, details)
                    }
                    other => other,
                }))
            }
        }
    }
}
