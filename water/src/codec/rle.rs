//! Escape-byte run-length encoding.
//!
//! ## Stream layout
//! - Literal: the value's raw little-endian bytes
//! - Run record: `[RLE_ESCAPE_MARKER, value bytes.., count]`, `1 <= count <= 254`
//!
//! Runs longer than [`RLE_LITERAL_RUN`] become run records. A literal whose
//! leading byte equals the marker would be misread as a record, so such a
//! value is always written as a record of count 1.

use super::CodecError;
use crate::constants::{RLE_ESCAPE_MARKER, RLE_LITERAL_RUN, RLE_MAX_RUN};

/// A fixed-width value that can be stored in an RLE stream.
pub trait RleElement: Copy + PartialEq {
    /// Number of bytes the value occupies in the stream.
    const WIDTH: usize;

    fn write_to(self, out: &mut Vec<u8>);

    /// Reads a value from exactly `WIDTH` bytes.
    fn read_from(bytes: &[u8]) -> Self;

    /// First byte written by [`RleElement::write_to`].
    fn leading_byte(self) -> u8;
}

impl RleElement for bool {
    const WIDTH: usize = 1;

    #[inline]
    fn write_to(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    #[inline]
    fn read_from(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn leading_byte(self) -> u8 {
        self as u8
    }
}

impl RleElement for u32 {
    const WIDTH: usize = 4;

    #[inline]
    fn write_to(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn read_from(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[inline]
    fn leading_byte(self) -> u8 {
        self.to_le_bytes()[0]
    }
}

fn write_run<T: RleElement>(out: &mut Vec<u8>, value: T, count: usize) {
    debug_assert!((1..=RLE_MAX_RUN).contains(&count));
    out.push(RLE_ESCAPE_MARKER);
    value.write_to(out);
    out.push(count as u8);
}

/// Encodes `values` into an RLE byte stream.
pub fn encode<T: RleElement>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len().min(1024) * T::WIDTH);
    let mut index = 0;

    while index < values.len() {
        let value = values[index];
        let run = values[index..]
            .iter()
            .take(RLE_MAX_RUN)
            .take_while(|v| **v == value)
            .count();

        if run > RLE_LITERAL_RUN {
            write_run(&mut out, value, run);
        } else if value.leading_byte() == RLE_ESCAPE_MARKER {
            for _ in 0..run {
                write_run(&mut out, value, 1);
            }
        } else {
            for _ in 0..run {
                value.write_to(&mut out);
            }
        }

        index += run;
    }

    out
}

/// Decodes an RLE byte stream produced by [`encode`].
pub fn decode<T: RleElement>(bytes: &[u8]) -> Result<Vec<T>, CodecError> {
    let mut out = Vec::with_capacity(bytes.len() / T::WIDTH);
    let mut offset = 0;

    while offset < bytes.len() {
        if bytes[offset] == RLE_ESCAPE_MARKER {
            let value_start = offset + 1;
            let count_at = value_start + T::WIDTH;
            if count_at >= bytes.len() {
                return Err(CodecError::Truncated { offset });
            }

            let value = T::read_from(&bytes[value_start..count_at]);
            let count = bytes[count_at] as usize;
            if count == 0 {
                return Err(CodecError::ZeroRun { offset });
            }

            out.extend(std::iter::repeat(value).take(count));
            offset = count_at + 1;
        } else {
            let end = offset + T::WIDTH;
            if end > bytes.len() {
                return Err(CodecError::Truncated { offset });
            }
            out.push(T::read_from(&bytes[offset..end]));
            offset = end;
        }
    }

    Ok(out)
}

/// Decodes a stream and checks it expands to exactly `expected` values.
pub fn decode_exact<T: RleElement>(bytes: &[u8], expected: usize) -> Result<Vec<T>, CodecError> {
    let values = decode(bytes)?;
    if values.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}
