//! Message serialization.

use crate::document::DocumentCodec;
use crate::error::{Error, Result};
use crate::message::{FieldValue, Message};

use super::codec::FrameBuilder;
use super::flags::encode_flags;
use super::schema::{FieldSpec, schema_for};

/// Serialize a message into a fresh buffer.
pub fn serialize<C: DocumentCodec>(message: &Message<C::Document>, codec: &C) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_message(&mut buf, message, codec)?;
    Ok(buf)
}

/// Append a serialized message to `buf`.
///
/// Fields are written in schema order. The flags word is always computed from
/// the message's named flags. On error `buf` is restored to its original
/// length. Returns the number of bytes written.
pub fn write_message<C: DocumentCodec>(
    buf: &mut Vec<u8>,
    message: &Message<C::Document>,
    codec: &C,
) -> Result<usize> {
    let start = buf.len();
    let result = write_frame(buf, message, codec);
    if result.is_err() {
        buf.truncate(start);
    }
    result
}

fn write_frame<C: DocumentCodec>(
    buf: &mut Vec<u8>,
    message: &Message<C::Document>,
    codec: &C,
) -> Result<usize> {
    let op_code = message.op_code();
    let schema = schema_for(op_code);

    let mut frame = FrameBuilder::new(buf, message.request_id(), message.response_to(), op_code);

    for spec in schema {
        if spec.is_flags() {
            let flags = message.flags().iter().map(|(name, on)| (*name, *on));
            frame.write_i32(encode_flags(op_code, flags));
            continue;
        }

        let Some(value) = message.get(spec.name) else {
            if spec.optional {
                continue;
            }
            return Err(Error::MissingField(spec.name));
        };

        write_field(frame.buf(), spec, value, codec)?;
    }

    let total = frame.finish()?;
    tracing::trace!(op_code = %op_code, total, "serialized message");
    Ok(total)
}

fn write_field<C: DocumentCodec>(
    out: &mut Vec<u8>,
    spec: &FieldSpec,
    value: &FieldValue<C::Document>,
    codec: &C,
) -> Result<()> {
    if !value.fits(spec) {
        return Err(Error::Schema(format!(
            "field '{}' is {:?}/{:?}, got {:?}",
            spec.name,
            spec.ty,
            spec.cardinality,
            value.shape()
        )));
    }

    match value {
        FieldValue::Int32(v) => super::codec::write_i32(out, *v),
        FieldValue::Int64(id) => super::codec::write_bytes(out, id.as_bytes()),
        FieldValue::Int64Array(ids) => {
            for id in ids {
                super::codec::write_bytes(out, id.as_bytes());
            }
        }
        FieldValue::CString(s) => {
            if s.as_bytes().contains(&0) {
                return Err(Error::Protocol(format!(
                    "field '{}' contains an interior NUL byte",
                    spec.name
                )));
            }
            super::codec::write_cstr(out, s);
        }
        FieldValue::Document(doc) => codec.encode(doc, out)?,
        FieldValue::DocumentArray(docs) => {
            for doc in docs {
                codec.encode(doc, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OpaqueCodec;
    use crate::protocol::types::{CursorId, OpCode};

    fn empty() -> Vec<u8> {
        vec![5, 0, 0, 0, 0]
    }

    #[test]
    fn test_delete_layout() {
        let msg = Message::delete("test.test", empty()).unwrap();
        let buf = serialize(&msg, &OpaqueCodec).unwrap();

        assert_eq!(buf.len(), 39);
        assert_eq!(&buf[0..4], &39i32.to_le_bytes());
        assert_eq!(&buf[12..16], &2006i32.to_le_bytes());
        assert_eq!(&buf[16..20], &[0, 0, 0, 0]); // ZERO
        assert_eq!(&buf[20..30], b"test.test\0");
        assert_eq!(&buf[30..34], &[0, 0, 0, 0]); // flags
        assert_eq!(&buf[34..], &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_flags_from_names() {
        let msg = Message::builder(OpCode::Query)
            .int32("flags", 0x7fff) // ignored
            .flag("SLAVE", true)
            .flag("EXHAUST", true)
            .cstring("fullCollectionName", "db.c")
            .int32("numberToSkip", 0)
            .int32("numberToReturn", 0)
            .document("query", empty())
            .build()
            .unwrap();
        let buf = serialize(&msg, &OpaqueCodec).unwrap();
        assert_eq!(&buf[16..20], &(4i32 | 64).to_le_bytes());
    }

    #[test]
    fn test_int64_verbatim() {
        let id = CursorId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
        let msg = Message::<Vec<u8>>::get_more("a.b", 10, id).unwrap();
        let buf = serialize(&msg, &OpaqueCodec).unwrap();
        assert_eq!(&buf[buf.len() - 8..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_error_restores_buffer() {
        let msg = Message::insert("a.b", vec![vec![9, 0, 0, 0, 0]]).unwrap();
        let mut buf = vec![1, 2, 3];
        assert!(matches!(
            write_message(&mut buf, &msg, &OpaqueCodec),
            Err(Error::Document(_))
        ));
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn test_interior_nul() {
        let msg = Message::<Vec<u8>>::builder(OpCode::Msg)
            .cstring("message", "a\0b")
            .build()
            .unwrap();
        assert!(serialize(&msg, &OpaqueCodec).is_err());
    }
}
