//! Incremental message parser.
//!
//! A [`ParseState`] reassembles one message from byte chunks of any size.
//! It never performs I/O: the caller reads from its transport, calls
//! [`ParseState::feed`], and keeps reading while it gets
//! [`Progress::NeedMoreData`].
//!
//! ```text
//! AwaitingHeader ──16 bytes──▶ ParsingFields ──all fields──▶ Complete
//! ```
//!
//! Bytes past the message's `totalLength` are kept as the remainder and seed
//! the next `ParseState`.

use crate::document::DocumentCodec;
use crate::error::{Error, Result};
use crate::message::{FieldValue, Message};
use crate::protocol::codec::{find_nul, read_cstr, read_cursor_id, read_i32};
use crate::protocol::flags::decode_flags;
use crate::protocol::header::{HEADER_SIZE, MessageHeader, decode_header};
use crate::protocol::schema::{Cardinality, FieldSpec, FieldType, schema_for};
use crate::protocol::types::CursorId;

/// Result of feeding bytes to a [`ParseState`].
#[derive(Debug)]
pub enum Progress<'a, D> {
    /// The message is not complete yet; supply more bytes.
    NeedMoreData,
    /// The message is complete.
    Complete(&'a Message<D>),
}

impl<D> Progress<'_, D> {
    /// Returns true for [`Progress::Complete`].
    pub fn is_complete(&self) -> bool {
        matches!(self, Progress::Complete(_))
    }
}

/// Parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    ParsingFields,
    Complete,
    Failed,
}

/// Outcome of one attempt at decoding a field.
enum Step {
    Done,
    Incomplete,
}

/// Reassembly state of one in-flight message.
pub struct ParseState<C: DocumentCodec> {
    codec: C,
    state: State,
    /// Unconsumed bytes; `pending[0]` is at message offset `consumed`
    pending: Vec<u8>,
    /// Read offset within `pending` during a pass
    cursor: usize,
    /// Message bytes already consumed and dropped from `pending`
    consumed: usize,
    header: Option<MessageHeader>,
    schema: &'static [FieldSpec],
    completed: Vec<&'static str>,
    fields: Vec<(&'static str, FieldValue<C::Document>)>,
    /// Elements of an array field decoded so far
    partial: Option<FieldValue<C::Document>>,
    flags: Vec<(&'static str, bool)>,
    message: Option<Message<C::Document>>,
}

impl<C: DocumentCodec> ParseState<C> {
    /// Create a parser for a new message.
    pub fn new(codec: C) -> Self {
        Self::with_remainder(codec, Vec::new())
    }

    /// Create a parser seeded with bytes left over from the previous message.
    ///
    /// Call [`feed`](Self::feed) (possibly with an empty chunk) to process them.
    pub fn with_remainder(codec: C, remainder: Vec<u8>) -> Self {
        Self {
            codec,
            state: State::AwaitingHeader,
            pending: remainder,
            cursor: 0,
            consumed: 0,
            header: None,
            schema: &[],
            completed: Vec::new(),
            fields: Vec::new(),
            partial: None,
            flags: Vec::new(),
            message: None,
        }
    }

    /// Append a chunk and decode as much of the message as possible.
    ///
    /// Once complete, further calls return the same message; any bytes they
    /// carry are added to the remainder.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Progress<'_, C::Document>> {
        match self.state {
            State::Failed => {
                return Err(Error::InvalidUsage(
                    "parse state already failed; start a new one".into(),
                ));
            }
            State::Complete => {
                self.pending.extend_from_slice(chunk);
            }
            State::AwaitingHeader | State::ParsingFields => {
                self.pending.extend_from_slice(chunk);
                if let Err(e) = self.advance() {
                    self.state = State::Failed;
                    return Err(e);
                }
            }
        }

        Ok(match &self.message {
            Some(message) => Progress::Complete(message),
            None => Progress::NeedMoreData,
        })
    }

    /// Returns true once the whole message has been decoded.
    pub fn is_finished(&self) -> bool {
        self.state == State::Complete
    }

    /// The header, once decoded.
    pub fn header(&self) -> Option<&MessageHeader> {
        self.header.as_ref()
    }

    /// The message, once complete.
    pub fn message(&self) -> Option<&Message<C::Document>> {
        self.message.as_ref()
    }

    /// Names of the fields decoded so far, in wire order.
    pub fn completed_fields(&self) -> &[&'static str] {
        &self.completed
    }

    /// Bytes received but not yet attributed to a decoded field.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Bytes that belong to the next message. Empty until complete.
    pub fn remainder(&self) -> &[u8] {
        match self.state {
            State::Complete => &self.pending,
            _ => &[],
        }
    }

    /// The document codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Take the completed message and the remainder bytes.
    pub fn finish(self) -> Result<(Message<C::Document>, Vec<u8>)> {
        match self.message {
            Some(message) => Ok((message, self.pending)),
            None => Err(Error::InvalidUsage("message is not complete".into())),
        }
    }

    /// Take the completed message and start parsing the next one from the
    /// remainder, reusing the codec.
    pub fn finish_and_continue(self) -> Result<(Message<C::Document>, ParseState<C>)> {
        match self.message {
            Some(message) => Ok((message, ParseState::with_remainder(self.codec, self.pending))),
            None => Err(Error::InvalidUsage("message is not complete".into())),
        }
    }

    fn advance(&mut self) -> Result<()> {
        let header = match self.header {
            Some(header) => header,
            None => {
                let Some(header) = decode_header(&self.pending)? else {
                    tracing::trace!(available = self.pending.len(), "awaiting header");
                    return Ok(());
                };
                self.schema = schema_for(header.op_code);
                self.header = Some(header);
                self.cursor = HEADER_SIZE;
                self.state = State::ParsingFields;
                tracing::trace!(
                    op_code = %header.op_code,
                    length = header.message_length,
                    request_id = header.request_id,
                    "decoded header"
                );
                header
            }
        };

        // Bytes of this message still expected, measured from `pending[0]`.
        let bound = header.total_length() - self.consumed;
        let limit = bound.min(self.pending.len());

        let schema = self.schema;
        let mut incomplete = false;
        for spec in schema {
            if self.completed.contains(&spec.name) {
                continue;
            }
            match self.decode_field(spec, bound, limit)? {
                Step::Done => {
                    tracing::trace!(field = spec.name, offset = self.consumed + self.cursor, "field complete");
                    self.completed.push(spec.name);
                }
                Step::Incomplete => {
                    incomplete = true;
                    break;
                }
            }
        }

        if !incomplete && self.cursor < bound {
            return Err(Error::Protocol(format!(
                "{} has {} trailing bytes after the last field",
                header.op_code,
                bound - self.cursor
            )));
        }

        self.pending.drain(..self.cursor);
        self.consumed += self.cursor;
        self.cursor = 0;

        if !incomplete {
            debug_assert_eq!(self.consumed, header.total_length());
            tracing::debug!(
                op_code = %header.op_code,
                length = header.message_length,
                request_id = header.request_id,
                response_to = header.response_to,
                "message complete"
            );
            self.state = State::Complete;
            self.message = Some(Message::from_parts(
                header,
                std::mem::take(&mut self.fields),
                std::mem::take(&mut self.flags),
            ));
        }
        Ok(())
    }

    fn decode_field(&mut self, spec: &FieldSpec, bound: usize, limit: usize) -> Result<Step> {
        if spec.optional && self.partial.is_none() && self.cursor == bound {
            // Omitted optional field: absent, not empty.
            return Ok(Step::Done);
        }

        let value = match (spec.ty, spec.cardinality) {
            (FieldType::Int32, Cardinality::Scalar) => {
                if !self.fixed_available(spec, 4, bound, limit)? {
                    return Ok(Step::Incomplete);
                }
                let (value, _) = read_i32(&self.pending[self.cursor..limit])?;
                self.cursor += 4;
                if spec.is_flags() {
                    if let Some(header) = &self.header {
                        self.flags = decode_flags(header.op_code, value);
                    }
                }
                FieldValue::Int32(value)
            }
            (FieldType::Int64, Cardinality::Scalar) => {
                if !self.fixed_available(spec, CursorId::SIZE, bound, limit)? {
                    return Ok(Step::Incomplete);
                }
                let (id, _) = read_cursor_id(&self.pending[self.cursor..limit])?;
                self.cursor += CursorId::SIZE;
                FieldValue::Int64(id)
            }
            (FieldType::Int64, Cardinality::Array) => {
                let mut ids = match self.partial.take() {
                    Some(FieldValue::Int64Array(ids)) => ids,
                    _ => Vec::new(),
                };
                while self.cursor < bound {
                    if !self.fixed_available(spec, CursorId::SIZE, bound, limit)? {
                        self.partial = Some(FieldValue::Int64Array(ids));
                        return Ok(Step::Incomplete);
                    }
                    let (id, _) = read_cursor_id(&self.pending[self.cursor..limit])?;
                    self.cursor += CursorId::SIZE;
                    ids.push(id);
                }
                FieldValue::Int64Array(ids)
            }
            (FieldType::CString, Cardinality::Scalar) => {
                let window = &self.pending[self.cursor..limit];
                let Some(nul) = find_nul(window) else {
                    if limit == bound {
                        return Err(Error::Protocol(format!(
                            "field '{}': no terminator before end of message",
                            spec.name
                        )));
                    }
                    return Ok(Step::Incomplete);
                };
                let (s, _) = read_cstr(window)?;
                let value = FieldValue::CString(s.to_owned());
                self.cursor += nul + 1;
                value
            }
            (FieldType::Document, Cardinality::Scalar) => match self.decode_document(spec, bound, limit)? {
                Some(doc) => FieldValue::Document(doc),
                None => return Ok(Step::Incomplete),
            },
            (FieldType::Document, Cardinality::Array) => {
                let mut docs = match self.partial.take() {
                    Some(FieldValue::DocumentArray(docs)) => docs,
                    _ => Vec::new(),
                };
                while self.cursor < bound {
                    match self.decode_document(spec, bound, limit)? {
                        Some(doc) => docs.push(doc),
                        None => {
                            self.partial = Some(FieldValue::DocumentArray(docs));
                            return Ok(Step::Incomplete);
                        }
                    }
                }
                FieldValue::DocumentArray(docs)
            }
            (ty, cardinality) => {
                return Err(Error::Schema(format!(
                    "field '{}' has unsupported type {ty:?}/{cardinality:?}",
                    spec.name
                )));
            }
        };

        self.fields.push((spec.name, value));
        Ok(Step::Done)
    }

    /// Whether `size` bytes at the cursor are available.
    ///
    /// Errors if the message itself is too short to hold them, since no
    /// further chunk could help.
    fn fixed_available(&self, spec: &FieldSpec, size: usize, bound: usize, limit: usize) -> Result<bool> {
        if self.cursor + size > bound {
            return Err(Error::Protocol(format!(
                "field '{}' needs {} bytes but the message has {} left",
                spec.name,
                size,
                bound - self.cursor
            )));
        }
        Ok(self.cursor + size <= limit)
    }

    /// Decode one length-prefixed document at the cursor, or `None` if its
    /// bytes have not all arrived.
    fn decode_document(&mut self, spec: &FieldSpec, bound: usize, limit: usize) -> Result<Option<C::Document>> {
        if !self.fixed_available(spec, 4, bound, limit)? {
            return Ok(None);
        }
        let (len, _) = read_i32(&self.pending[self.cursor..limit])?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len >= 4)
            .ok_or_else(|| {
                Error::Protocol(format!("field '{}': invalid document length {len}", spec.name))
            })?;
        if !self.fixed_available(spec, len, bound, limit)? {
            return Ok(None);
        }
        let doc = self
            .codec
            .decode(&self.pending[self.cursor..self.cursor + len])?;
        self.cursor += len;
        Ok(Some(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OpaqueCodec;
    use crate::protocol::serialize::serialize;
    use crate::protocol::types::OpCode;

    fn doc(payload: &[u8]) -> Vec<u8> {
        // Opaque blob: length prefix + payload + trailing zero.
        let len = (payload.len() + 5) as i32;
        let mut out = len.to_le_bytes().to_vec();
        out.extend_from_slice(payload);
        out.push(0);
        out
    }

    fn delete_bytes() -> Vec<u8> {
        let msg = Message::delete("test.test", doc(b"")).unwrap();
        serialize(&msg, &OpaqueCodec).unwrap()
    }

    #[test]
    fn test_whole_message() {
        let bytes = delete_bytes();
        assert_eq!(bytes.len(), 39);

        let mut state = ParseState::new(OpaqueCodec);
        let progress = state.feed(&bytes).unwrap();
        let Progress::Complete(msg) = progress else {
            panic!("expected complete");
        };
        assert_eq!(msg.header().message_length, 39);
        assert_eq!(msg.op_code(), OpCode::Delete);
        assert_eq!(msg.cstring("fullCollectionName"), Some("test.test"));
        assert_eq!(msg.document("selector"), Some(&doc(b"")));
        assert!(state.remainder().is_empty());
    }

    #[test]
    fn test_header_needs_sixteen_bytes() {
        let bytes = delete_bytes();
        let mut state = ParseState::new(OpaqueCodec);
        assert!(!state.feed(&bytes[..15]).unwrap().is_complete());
        assert!(state.header().is_none());
        assert!(!state.feed(&bytes[15..16]).unwrap().is_complete());
        assert_eq!(state.header().unwrap().op_code, OpCode::Delete);
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = delete_bytes();
        let mut state = ParseState::new(OpaqueCodec);
        for (i, byte) in bytes.iter().enumerate() {
            let done = state.feed(std::slice::from_ref(byte)).unwrap().is_complete();
            assert_eq!(done, i == bytes.len() - 1, "byte {i}");
        }
        assert_eq!(
            state.completed_fields(),
            &["ZERO", "fullCollectionName", "flags", "selector"]
        );
    }

    #[test]
    fn test_sticky_complete() {
        let bytes = delete_bytes();
        let mut state = ParseState::new(OpaqueCodec);
        state.feed(&bytes).unwrap();
        let before = state.message().unwrap().clone();
        assert!(state.feed(&[]).unwrap().is_complete());
        assert_eq!(state.message().unwrap(), &before);
        assert_eq!(state.completed_fields().len(), 4);

        // Late bytes become remainder.
        state.feed(&[1, 2]).unwrap();
        assert_eq!(state.remainder(), &[1, 2]);
    }

    #[test]
    fn test_remainder_seeds_next() {
        let mut bytes = delete_bytes();
        bytes.extend_from_slice(&delete_bytes());
        bytes.extend_from_slice(&delete_bytes()[..10]);

        let mut state = ParseState::new(OpaqueCodec);
        assert!(state.feed(&bytes).unwrap().is_complete());
        assert_eq!(state.remainder().len(), 49);

        let (_, mut state) = state.finish_and_continue().unwrap();
        assert!(state.feed(&[]).unwrap().is_complete());
        let (_, rest) = state.finish().unwrap();
        assert_eq!(rest, &delete_bytes()[..10]);
    }

    #[test]
    fn test_partial_cursor_array() {
        let ids: Vec<_> = (1..=3).map(CursorId::from_i64).collect();
        let msg = Message::<Vec<u8>>::kill_cursors(ids.clone()).unwrap();
        let bytes = serialize(&msg, &OpaqueCodec).unwrap();

        let mut state = ParseState::new(OpaqueCodec);
        // Header + ZERO + count + one and a half ids.
        assert!(!state.feed(&bytes[..16 + 8 + 12]).unwrap().is_complete());
        assert!(state.feed(&bytes[16 + 8 + 12..]).unwrap().is_complete());
        assert_eq!(state.message().unwrap().cursor_ids("cursorIDs"), Some(ids.as_slice()));
    }

    #[test]
    fn test_optional_absent() {
        let msg = Message::query("db.c", 0, 100, doc(b"\x10"), None).unwrap();
        let bytes = serialize(&msg, &OpaqueCodec).unwrap();
        let mut state = ParseState::new(OpaqueCodec);
        state.feed(&bytes).unwrap();
        let parsed = state.message().unwrap();
        assert!(!parsed.contains("returnFieldsSelector"));
        assert_eq!(parsed.document("query"), Some(&doc(b"\x10")));
    }

    #[test]
    fn test_unknown_opcode() {
        let mut bytes = delete_bytes();
        bytes[12..16].copy_from_slice(&77i32.to_le_bytes());
        let mut state = ParseState::new(OpaqueCodec);
        assert!(matches!(state.feed(&bytes), Err(Error::Schema(_))));
        assert!(matches!(state.feed(&[]), Err(Error::InvalidUsage(_))));
    }

    #[test]
    fn test_document_overruns_message() {
        let mut bytes = delete_bytes();
        // Selector claims 6 bytes but only 5 belong to the message.
        bytes[34..38].copy_from_slice(&6i32.to_le_bytes());
        bytes.push(0);
        let mut state = ParseState::new(OpaqueCodec);
        assert!(matches!(state.feed(&bytes), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = delete_bytes();
        bytes[0..4].copy_from_slice(&40i32.to_le_bytes());
        bytes.push(0);
        let mut state = ParseState::new(OpaqueCodec);
        assert!(matches!(state.feed(&bytes), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_waits_for_document_body() {
        let bytes = delete_bytes();
        let mut state = ParseState::new(OpaqueCodec);
        // Length prefix of the selector present, body not.
        assert!(!state.feed(&bytes[..36]).unwrap().is_complete());
        assert!(!state.feed(&bytes[36..38]).unwrap().is_complete());
        assert!(state.feed(&bytes[38..]).unwrap().is_complete());
    }

    #[test]
    fn test_finish_incomplete() {
        let state = ParseState::new(OpaqueCodec);
        assert!(matches!(state.finish(), Err(Error::InvalidUsage(_))));
    }

    fn frame(op_code: OpCode, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [(HEADER_SIZE + body.len()) as i32, 0, 0, op_code.as_i32()] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(body);
        out
    }

    /// Feed one byte at a time; returns the index of the byte that raised a
    /// protocol error.
    fn protocol_error_at(bytes: &[u8]) -> usize {
        let mut state = ParseState::new(OpaqueCodec);
        for (i, byte) in bytes.iter().enumerate() {
            match state.feed(std::slice::from_ref(byte)) {
                Ok(progress) => assert!(!progress.is_complete(), "byte {i}"),
                Err(Error::Protocol(_)) => return i,
                Err(e) => panic!("byte {i}: unexpected {e}"),
            }
        }
        panic!("no protocol error in {} bytes", bytes.len());
    }

    #[test]
    fn test_cstring_without_terminator() {
        let bytes = frame(OpCode::Msg, b"abcd");
        assert_eq!(protocol_error_at(&bytes), bytes.len() - 1);
    }

    #[test]
    fn test_document_length_below_four() {
        let mut body = 0i32.to_le_bytes().to_vec();
        body.extend_from_slice(b"a\0");
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&2i32.to_le_bytes());
        let bytes = frame(OpCode::Delete, &body);
        assert_eq!(protocol_error_at(&bytes), bytes.len() - 1);

        let mut negative = bytes.clone();
        let at = negative.len() - 4;
        negative[at..].copy_from_slice(&(-5i32).to_le_bytes());
        assert_eq!(protocol_error_at(&negative), negative.len() - 1);
    }

    #[test]
    fn test_cursor_id_overruns_message() {
        let mut body = 0i32.to_le_bytes().to_vec();
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend_from_slice(&[0xAA; 4]);
        let bytes = frame(OpCode::KillCursors, &body);
        assert_eq!(bytes.len(), 28);
        // Once the count is read, only 4 of the 8 id bytes fit in the message.
        assert_eq!(protocol_error_at(&bytes), 23);
    }

    #[test]
    fn test_scalar_past_bound() {
        // OP_GET_MORE with the cursor id cut short by totalLength.
        let mut body = 0i32.to_le_bytes().to_vec();
        body.extend_from_slice(b"a.b\0");
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend_from_slice(&[1, 2, 3]);
        let bytes = frame(OpCode::GetMore, &body);
        assert_eq!(protocol_error_at(&bytes), bytes.len() - 4);
    }
}
