//! The fixed 16-byte message header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

use super::types::{I32LE, OpCode};

/// Size of the header on the wire.
pub const HEADER_SIZE: usize = 16;

/// Header as laid out on the wire.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct RawHeader {
    /// Total message size, header included
    pub message_length: I32LE,
    /// Identifier chosen by the sender
    pub request_id: I32LE,
    /// `request_id` of the message this one answers
    pub response_to: I32LE,
    /// Opcode
    pub op_code: I32LE,
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message size in bytes, header included
    pub message_length: i32,
    /// Identifier chosen by the sender
    pub request_id: i32,
    /// `request_id` of the message this one answers (0 for requests)
    pub response_to: i32,
    /// Message kind
    pub op_code: OpCode,
}

impl MessageHeader {
    /// Total message length as a byte count.
    pub fn total_length(&self) -> usize {
        usize::try_from(self.message_length).unwrap_or(0)
    }
}

/// Decode a header from the start of `data`.
///
/// Returns `Ok(None)` when fewer than [`HEADER_SIZE`] bytes are available.
pub fn decode_header(data: &[u8]) -> Result<Option<MessageHeader>> {
    if data.len() < HEADER_SIZE {
        return Ok(None);
    }
    let (raw, _) = RawHeader::ref_from_prefix(data)?;

    let message_length = raw.message_length.get();
    if message_length < HEADER_SIZE as i32 {
        return Err(Error::Protocol(format!(
            "Invalid message length: {message_length}"
        )));
    }

    Ok(Some(MessageHeader {
        message_length,
        request_id: raw.request_id.get(),
        response_to: raw.response_to.get(),
        op_code: OpCode::from_i32(raw.op_code.get())?,
    }))
}

/// Append a header to `out`, writing `message_length` as a zero placeholder.
///
/// The caller patches the length once the body is known.
pub fn encode_header(header: &MessageHeader, out: &mut Vec<u8>) {
    let raw = RawHeader {
        message_length: I32LE::new(0),
        request_id: I32LE::new(header.request_id),
        response_to: I32LE::new(header.response_to),
        op_code: I32LE::new(header.op_code.as_i32()),
    };
    out.extend_from_slice(raw.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(len: i32, req: i32, resp: i32, op: i32) -> Vec<u8> {
        [len, req, resp, op]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_decode_header() {
        let data = header_bytes(39, 5, 0, 2006);
        let header = decode_header(&data).unwrap().unwrap();
        assert_eq!(header.message_length, 39);
        assert_eq!(header.request_id, 5);
        assert_eq!(header.response_to, 0);
        assert_eq!(header.op_code, OpCode::Delete);
        assert_eq!(header.total_length(), 39);
    }

    #[test]
    fn test_need_more_data() {
        let data = header_bytes(39, 5, 0, 2006);
        for n in 0..HEADER_SIZE {
            assert!(decode_header(&data[..n]).unwrap().is_none());
        }
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            decode_header(&header_bytes(39, 0, 0, 42)),
            Err(Error::Schema(_))
        ));
        assert!(matches!(
            decode_header(&header_bytes(15, 0, 0, 1)),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_encode_header_placeholder() {
        let mut out = vec![0xAA];
        encode_header(
            &MessageHeader {
                message_length: 99,
                request_id: 3,
                response_to: 4,
                op_code: OpCode::Reply,
            },
            &mut out,
        );
        assert_eq!(out.len(), 1 + HEADER_SIZE);
        assert_eq!(&out[1..], header_bytes(0, 3, 4, 1).as_slice());
    }
}
