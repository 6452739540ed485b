//! Fixed-width field helpers

use bytes::{Buf, BufMut};
use std::fmt;

use super::width;

/// Copy up to `width` bytes of `value`, zero-padding the rest.
/// Longer values are truncated at the field boundary.
pub fn put_fixed_str(buf: &mut impl BufMut, value: &str, width: usize) {
    put_fixed_bytes(buf, value.as_bytes(), width);
}

pub(crate) fn put_fixed_bytes(buf: &mut impl BufMut, value: &[u8], width: usize) {
    let n = value.len().min(width);
    buf.put_slice(&value[..n]);
    buf.put_bytes(0, width - n);
}

/// Read a `width`-byte field, stopping at the first NUL.
/// Caller guarantees `width` bytes are available.
pub fn get_fixed_str(buf: &mut impl Buf, width: usize) -> String {
    let raw = buf.copy_to_bytes(width);
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// The 8-byte trailer on bind, deliver, report and their responses.
/// Captured on decode; written as zeros on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reserved(pub [u8; width::RESERVED]);

impl Reserved {
    pub fn decode(buf: &mut impl Buf) -> Self {
        let mut raw = [0u8; width::RESERVED];
        buf.copy_to_slice(&mut raw);
        Self(raw)
    }

    pub fn encode_zeroed(buf: &mut impl BufMut) {
        buf.put_bytes(0, width::RESERVED);
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for Reserved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reserve:{}", self.to_hex())
    }
}
