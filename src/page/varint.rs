//! Variable-length integers
//!
//! The first byte selects the width; everything after it is big-endian.
//!
//! ```text
//!   b0 <= 240          value = b0
//!   241 <= b0 <= 248   value = 240 + 256 * (b0 - 241) + b1
//!   b0 == 249          value = 2288 + 256 * b1 + b2
//!   250 <= b0 <= 254   value = next (b0 - 247) bytes, big-endian
//!   b0 == 255          value = next 8 bytes, big-endian
//! ```

use crate::error::{Result, VfsError};

/// Longest possible encoding (prefix + 8 bytes)
pub const MAX_VARINT_LEN: usize = 9;

/// Decode a varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize)> {
    let b0 = *bytes
        .first()
        .ok_or_else(|| VfsError::Corrupt("truncated varint: empty input".to_string()))?;

    match b0 {
        0..=240 => Ok((u64::from(b0), 1)),
        241..=248 => {
            let b1 = take(bytes, 1)?[0];
            Ok((240 + 256 * u64::from(b0 - 241) + u64::from(b1), 2))
        }
        249 => {
            let rest = take(bytes, 2)?;
            Ok((2288 + 256 * u64::from(rest[0]) + u64::from(rest[1]), 3))
        }
        _ => {
            let width = if b0 == 255 { 8 } else { usize::from(b0 - 247) };
            let rest = take(bytes, width)?;
            Ok((read_be(rest), 1 + width))
        }
    }
}

/// Canonical (shortest) encoding of `value`
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(value));

    match value {
        0..=240 => out.push(value as u8),
        241..=2287 => {
            let v = value - 240;
            out.push((v / 256 + 241) as u8);
            out.push((v % 256) as u8);
        }
        2288..=67823 => {
            let v = value - 2288;
            out.push(249);
            out.push((v / 256) as u8);
            out.push((v % 256) as u8);
        }
        _ => {
            let width = be_width(value);
            out.push(if width == 8 { 255 } else { 247 + width as u8 });
            out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
        }
    }

    out
}

/// Number of bytes `encode(value)` produces
pub fn encoded_len(value: u64) -> usize {
    match value {
        0..=240 => 1,
        241..=2287 => 2,
        2288..=67823 => 3,
        _ => 1 + be_width(value),
    }
}

/// Big-endian width (3..=8) used by the wide forms
fn be_width(value: u64) -> usize {
    let significant = 8 - (value.leading_zeros() as usize / 8);
    significant.max(3)
}

fn take(bytes: &[u8], n: usize) -> Result<&[u8]> {
    bytes.get(1..1 + n).ok_or_else(|| {
        VfsError::Corrupt(format!(
            "truncated varint: prefix 0x{:02x} needs {} more bytes, {} available",
            bytes[0],
            n,
            bytes.len() - 1
        ))
    })
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
