//! Wire protocol encoding and decoding primitives.
//!
//! The MongoDB wire protocol is little-endian throughout.

use zerocopy::FromBytes;

use crate::error::{Error, Result};

use super::header::{HEADER_SIZE, MessageHeader, encode_header};
use super::types::{CursorId, I32LE, OpCode};

/// Read 4-byte little-endian signed integer.
#[inline]
pub fn read_i32(data: &[u8]) -> Result<(i32, &[u8])> {
    if data.len() < 4 {
        return Err(Error::Protocol(format!(
            "read_i32: buffer too short: {} < 4",
            data.len()
        )));
    }
    let value = I32LE::ref_from_bytes(&data[..4])
        .map_err(|e| Error::Protocol(format!("read_i32: {e:?}")))?
        .get();
    Ok((value, &data[4..]))
}

/// Read an opaque 8-byte cursor id.
#[inline]
pub fn read_cursor_id(data: &[u8]) -> Result<(CursorId, &[u8])> {
    let (id, rest) = CursorId::read_from_prefix(data).map_err(|_| {
        Error::Protocol(format!(
            "read_cursor_id: buffer too short: {} < 8",
            data.len()
        ))
    })?;
    Ok((id, rest))
}

/// Position of the NUL terminator of a C string, if present.
#[inline]
pub fn find_nul(data: &[u8]) -> Option<usize> {
    memchr::memchr(0, data)
}

/// Read null-terminated string.
/// Returns the string bytes (without the null terminator) and remaining data.
#[inline]
pub fn read_cstring(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match find_nul(data) {
        Some(pos) => Ok((&data[..pos], &data[pos + 1..])),
        None => Err(Error::Protocol(
            "read_cstring: no null terminator found".into(),
        )),
    }
}

/// Read null-terminated string as &str.
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_cstring(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Write 4-byte little-endian signed integer.
#[inline]
pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write raw bytes.
#[inline]
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write null-terminated string.
#[inline]
pub fn write_cstring(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(s);
    out.push(0);
}

/// Write null-terminated string from &str.
#[inline]
pub fn write_cstr(out: &mut Vec<u8>, s: &str) {
    write_cstring(out, s.as_bytes());
}

/// Frame builder that handles the length field.
///
/// Wire message format:
/// - Header (16 bytes) - `totalLength` includes the header itself
/// - Body (`totalLength - 16` bytes)
pub struct FrameBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> FrameBuilder<'a> {
    /// Start building a frame; writes the header with a length placeholder.
    pub fn new(buf: &'a mut Vec<u8>, request_id: i32, response_to: i32, op_code: OpCode) -> Self {
        let start = buf.len();
        encode_header(
            &MessageHeader {
                message_length: 0,
                request_id,
                response_to,
                op_code,
            },
            buf,
        );
        Self { buf, start }
    }

    /// Get mutable access to the underlying buffer.
    pub fn buf(&mut self) -> &mut Vec<u8> {
        self.buf
    }

    /// Write an i32.
    pub fn write_i32(&mut self, value: i32) {
        write_i32(self.buf, value);
    }

    /// Finish building the frame and fill in the length field.
    ///
    /// Returns the total frame length.
    pub fn finish(self) -> Result<usize> {
        let total = self.buf.len() - self.start;
        let len = i32::try_from(total)
            .map_err(|_| Error::Protocol(format!("message too large: {total} bytes")))?;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_le_bytes());
        debug_assert!(total >= HEADER_SIZE);
        Ok(total)
    }
}
