//! Conversions from UI form values to request field values.
//!
//! Generated forms keep 32-bit and floating point inputs as `f64`, and
//! 64-bit integers and every text input as `String`. These helpers turn them
//! into the types `prost` uses.

use std::str::FromStr;

/// Numeric request field types a number widget can feed
pub trait NumberInput: Sized {
    /// Converts a widget value, returning `None` when it does not fit
    fn from_input(value: f64) -> Option<Self>;
}

impl NumberInput for f64 {
    fn from_input(value: f64) -> Option<Self> {
        Some(value)
    }
}

impl NumberInput for f32 {
    fn from_input(value: f64) -> Option<Self> {
        if value.is_finite() && value.abs() > f32::MAX as f64 {
            return None;
        }
        Some(value as f32)
    }
}

macro_rules! integer_input {
    ($($ty:ty),*) => {
        $(
            impl NumberInput for $ty {
                fn from_input(value: f64) -> Option<Self> {
                    if !value.is_finite() {
                        return None;
                    }
                    let truncated = value.trunc();
                    if truncated < <$ty>::MIN as f64 || truncated > <$ty>::MAX as f64 {
                        return None;
                    }
                    Some(truncated as $ty)
                }
            }
        )*
    };
}

integer_input!(i32, u32);

/// Converts a number widget value for the field named `field`
pub fn number<T: NumberInput>(field: &str, value: f64) -> Result<T, String> {
    T::from_input(value).ok_or_else(|| format!("Invalid input for `{}`", field))
}

/// Parses a text widget value for a 64-bit integer field named `field`.
///
/// Text keeps the full range that an `f64` drag value cannot represent.
pub fn integer<T: FromStr>(field: &str, text: &str) -> Result<T, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("Invalid input for `{}`", field))
}

/// Converts a text widget value into a bytes field.
///
/// `0x`-prefixed input is read as hex, anything else as UTF-8 text.
pub fn bytes(field: &str, text: &str) -> Result<Vec<u8>, String> {
    let Some(digits) = text.strip_prefix("0x") else {
        return Ok(text.as_bytes().to_vec());
    };

    hex::decode(digits).map_err(|e| format!("Invalid hex input for `{}`: {}", field, e))
}
