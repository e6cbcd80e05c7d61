//! Typed wire messages.

use crate::error::{Error, Result};
use crate::protocol::flags::{decode_flags, encode_flags, flag_spec, flags_for};
use crate::protocol::header::MessageHeader;
use crate::protocol::schema::{Cardinality, FieldSpec, FieldType, field_spec, schema_for};
use crate::protocol::types::{CursorId, OpCode};

/// Decoded value of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<D> {
    /// Int32 scalar
    Int32(i32),
    /// Opaque 8-byte scalar
    Int64(CursorId),
    /// Sequence of opaque 8-byte values
    Int64Array(Vec<CursorId>),
    /// UTF-8 string
    CString(String),
    /// Single document
    Document(D),
    /// Sequence of documents
    DocumentArray(Vec<D>),
}

impl<D> FieldValue<D> {
    /// Wire type and cardinality this value encodes as.
    pub fn shape(&self) -> (FieldType, Cardinality) {
        match self {
            FieldValue::Int32(_) => (FieldType::Int32, Cardinality::Scalar),
            FieldValue::Int64(_) => (FieldType::Int64, Cardinality::Scalar),
            FieldValue::Int64Array(_) => (FieldType::Int64, Cardinality::Array),
            FieldValue::CString(_) => (FieldType::CString, Cardinality::Scalar),
            FieldValue::Document(_) => (FieldType::Document, Cardinality::Scalar),
            FieldValue::DocumentArray(_) => (FieldType::Document, Cardinality::Array),
        }
    }

    /// Returns true if this value can be written as `spec`.
    pub fn fits(&self, spec: &FieldSpec) -> bool {
        self.shape() == (spec.ty, spec.cardinality)
    }
}

/// A complete wire message.
///
/// Produced by [`ParseState`](crate::state::parse::ParseState) once every byte
/// has arrived, or by [`MessageBuilder::build`] for sending.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<D> {
    header: MessageHeader,
    fields: Vec<(&'static str, FieldValue<D>)>,
    flags: Vec<(&'static str, bool)>,
}

impl<D> Message<D> {
    pub(crate) fn from_parts(
        header: MessageHeader,
        fields: Vec<(&'static str, FieldValue<D>)>,
        flags: Vec<(&'static str, bool)>,
    ) -> Self {
        Self {
            header,
            fields,
            flags,
        }
    }

    /// Start building a message of the given kind.
    pub fn builder(op_code: OpCode) -> MessageBuilder<D> {
        MessageBuilder::new(op_code)
    }

    /// Message header.
    ///
    /// For built messages `message_length` is 0; the length is only known
    /// once the documents are encoded, and the serializer computes it.
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// Message kind.
    pub fn op_code(&self) -> OpCode {
        self.header.op_code
    }

    /// Sender-chosen request id.
    pub fn request_id(&self) -> i32 {
        self.header.request_id
    }

    /// Request id this message answers.
    pub fn response_to(&self) -> i32 {
        self.header.response_to
    }

    /// Fields present, in wire order.
    pub fn fields(&self) -> &[(&'static str, FieldValue<D>)] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue<D>> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }

    /// Returns true if the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Int32 field value.
    pub fn int32(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            FieldValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Scalar Int64 field value.
    pub fn cursor_id(&self, name: &str) -> Option<CursorId> {
        match self.get(name)? {
            FieldValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Int64 array field value.
    pub fn cursor_ids(&self, name: &str) -> Option<&[CursorId]> {
        match self.get(name)? {
            FieldValue::Int64Array(v) => Some(v),
            _ => None,
        }
    }

    /// CString field value.
    pub fn cstring(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FieldValue::CString(v) => Some(v),
            _ => None,
        }
    }

    /// Scalar document field value.
    pub fn document(&self, name: &str) -> Option<&D> {
        match self.get(name)? {
            FieldValue::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Document array field value.
    pub fn documents(&self, name: &str) -> Option<&[D]> {
        match self.get(name)? {
            FieldValue::DocumentArray(v) => Some(v),
            _ => None,
        }
    }

    /// Named flags, one entry per bit in the opcode's flag table.
    pub fn flags(&self) -> &[(&'static str, bool)] {
        &self.flags
    }

    /// Value of a named flag; unknown or unset names are `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.iter().any(|(n, on)| *n == name && *on)
    }

    /// Split into header, fields, and flags.
    pub fn into_parts(
        self,
    ) -> (
        MessageHeader,
        Vec<(&'static str, FieldValue<D>)>,
        Vec<(&'static str, bool)>,
    ) {
        (self.header, self.fields, self.flags)
    }
}

impl<D> Message<D> {
    /// OP_QUERY against `collection`.
    pub fn query(
        collection: &str,
        number_to_skip: i32,
        number_to_return: i32,
        query: D,
        return_fields_selector: Option<D>,
    ) -> Result<Self> {
        let builder = Self::builder(OpCode::Query)
            .cstring("fullCollectionName", collection)
            .int32("numberToSkip", number_to_skip)
            .int32("numberToReturn", number_to_return)
            .document("query", query);
        let builder = match return_fields_selector {
            Some(selector) => builder.documents("returnFieldsSelector", vec![selector]),
            None => builder,
        };
        builder.build()
    }

    /// OP_INSERT of `documents` into `collection`.
    pub fn insert(collection: &str, documents: Vec<D>) -> Result<Self> {
        Self::builder(OpCode::Insert)
            .cstring("fullCollectionName", collection)
            .documents("documents", documents)
            .build()
    }

    /// OP_DELETE of the documents matching `selector`.
    pub fn delete(collection: &str, selector: D) -> Result<Self> {
        Self::builder(OpCode::Delete)
            .int32("ZERO", 0)
            .cstring("fullCollectionName", collection)
            .document("selector", selector)
            .build()
    }

    /// OP_GET_MORE on an open cursor.
    pub fn get_more(collection: &str, number_to_return: i32, cursor_id: CursorId) -> Result<Self> {
        Self::builder(OpCode::GetMore)
            .int32("ZERO", 0)
            .cstring("fullCollectionName", collection)
            .int32("numberToReturn", number_to_return)
            .cursor_id("cursorID", cursor_id)
            .build()
    }

    /// OP_KILL_CURSORS; `numberOfCursorIDs` is taken from the id count.
    pub fn kill_cursors(cursor_ids: Vec<CursorId>) -> Result<Self> {
        let count = i32::try_from(cursor_ids.len())
            .map_err(|_| Error::InvalidUsage(format!("too many cursors: {}", cursor_ids.len())))?;
        Self::builder(OpCode::KillCursors)
            .int32("ZERO", 0)
            .int32("numberOfCursorIDs", count)
            .cursor_ids("cursorIDs", cursor_ids)
            .build()
    }

    /// OP_REPLY answering `response_to`; `numberReturned` is taken from the
    /// document count.
    pub fn reply(
        response_to: i32,
        cursor_id: CursorId,
        starting_from: i32,
        documents: Vec<D>,
    ) -> Result<Self> {
        let count = i32::try_from(documents.len())
            .map_err(|_| Error::InvalidUsage(format!("too many documents: {}", documents.len())))?;
        Self::builder(OpCode::Reply)
            .response_to(response_to)
            .cursor_id("cursorID", cursor_id)
            .int32("startingFrom", starting_from)
            .int32("numberReturned", count)
            .documents("documents", documents)
            .build()
    }
}

/// Builder for outgoing messages.
///
/// Problems are collected as they happen and reported by [`build`](Self::build),
/// so calls can be chained.
#[derive(Debug)]
pub struct MessageBuilder<D> {
    op_code: OpCode,
    request_id: i32,
    response_to: i32,
    fields: Vec<(&'static str, FieldValue<D>)>,
    flags: Vec<(&'static str, bool)>,
    error: Option<Error>,
}

impl<D> MessageBuilder<D> {
    /// Start building a message of the given kind.
    pub fn new(op_code: OpCode) -> Self {
        Self {
            op_code,
            request_id: 0,
            response_to: 0,
            fields: Vec::new(),
            flags: decode_flags(op_code, 0),
            error: None,
        }
    }

    /// Set the request id (default 0).
    pub fn request_id(mut self, request_id: i32) -> Self {
        self.request_id = request_id;
        self
    }

    /// Set the id of the request being answered (default 0).
    pub fn response_to(mut self, response_to: i32) -> Self {
        self.response_to = response_to;
        self
    }

    /// Set any field. Replaces an earlier value for the same name.
    ///
    /// A value given for `flags` is overwritten by [`build`](Self::build)
    /// with the word encoded from the named flags.
    pub fn field(mut self, name: &str, value: FieldValue<D>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let spec = match field_spec(self.op_code, name) {
            Ok(spec) => spec,
            Err(e) => {
                self.error = Some(e);
                return self;
            }
        };
        if !value.fits(spec) {
            self.error = Some(Error::Schema(format!(
                "{} field '{}' is {:?}/{:?}, got {:?}",
                self.op_code,
                spec.name,
                spec.ty,
                spec.cardinality,
                value.shape()
            )));
            return self;
        }
        match self.fields.iter_mut().find(|(n, _)| *n == spec.name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((spec.name, value)),
        }
        self
    }

    /// Set an Int32 field.
    pub fn int32(self, name: &str, value: i32) -> Self {
        self.field(name, FieldValue::Int32(value))
    }

    /// Set a scalar Int64 field.
    pub fn cursor_id(self, name: &str, value: CursorId) -> Self {
        self.field(name, FieldValue::Int64(value))
    }

    /// Set an Int64 array field.
    pub fn cursor_ids(self, name: &str, values: Vec<CursorId>) -> Self {
        self.field(name, FieldValue::Int64Array(values))
    }

    /// Set a CString field.
    pub fn cstring(self, name: &str, value: impl Into<String>) -> Self {
        self.field(name, FieldValue::CString(value.into()))
    }

    /// Set a scalar document field.
    pub fn document(self, name: &str, value: D) -> Self {
        self.field(name, FieldValue::Document(value))
    }

    /// Set a document array field.
    pub fn documents(self, name: &str, values: Vec<D>) -> Self {
        self.field(name, FieldValue::DocumentArray(values))
    }

    /// Set a named flag.
    pub fn flag(mut self, name: &str, on: bool) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(spec) = flag_spec(self.op_code, name) else {
            self.error = Some(Error::Schema(format!(
                "{} has no flag '{}' (known: {:?})",
                self.op_code,
                name,
                flags_for(self.op_code)
                    .iter()
                    .map(|f| f.name)
                    .collect::<Vec<_>>()
            )));
            return self;
        };
        if let Some(slot) = self.flags.iter_mut().find(|(n, _)| *n == spec.name) {
            slot.1 = on;
        }
        self
    }

    /// Validate and produce the message.
    ///
    /// Every non-optional field other than `flags` must be set. The `flags`
    /// field, when the opcode has one, holds the encoded named flags.
    pub fn build(self) -> Result<Message<D>> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let schema = schema_for(self.op_code);

        let mut fields = self.fields;
        for spec in schema {
            if !spec.optional
                && !spec.is_flags()
                && !fields.iter().any(|(n, _)| *n == spec.name)
            {
                return Err(Error::MissingField(spec.name));
            }
        }
        if let Some(spec) = schema.iter().find(|spec| spec.is_flags()) {
            let word = FieldValue::Int32(encode_flags(
                self.op_code,
                self.flags.iter().map(|(name, on)| (*name, *on)),
            ));
            match fields.iter_mut().find(|(n, _)| *n == spec.name) {
                Some(slot) => slot.1 = word,
                None => fields.push((spec.name, word)),
            }
        }
        // Keep wire order regardless of call order.
        fields.sort_by_key(|(name, _)| schema.iter().position(|s| s.name == *name));

        Ok(Message {
            header: MessageHeader {
                message_length: 0,
                request_id: self.request_id,
                response_to: self.response_to,
                op_code: self.op_code,
            },
            fields,
            flags: self.flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Doc = Vec<u8>;

    fn empty() -> Doc {
        vec![5, 0, 0, 0, 0]
    }

    #[test]
    fn test_build_delete() {
        let msg: Message<Doc> = Message::delete("test.test", empty()).unwrap();
        assert_eq!(msg.op_code(), OpCode::Delete);
        assert_eq!(msg.cstring("fullCollectionName"), Some("test.test"));
        assert_eq!(msg.int32("ZERO"), Some(0));
        assert!(!msg.flag("SINGLE_REMOVE"));
        assert_eq!(msg.flags(), &[("SINGLE_REMOVE", false)]);
    }

    #[test]
    fn test_missing_field() {
        let err = Message::<Doc>::builder(OpCode::Delete)
            .int32("ZERO", 0)
            .document("selector", empty())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingField("fullCollectionName")));
    }

    #[test]
    fn test_flags_field_not_required() {
        let msg = Message::<Doc>::builder(OpCode::Query)
            .cstring("fullCollectionName", "admin.$cmd")
            .int32("numberToSkip", 0)
            .int32("numberToReturn", -1)
            .document("query", empty())
            .build()
            .unwrap();
        assert_eq!(msg.int32("flags"), Some(0));
        assert!(!msg.contains("returnFieldsSelector"));
    }

    #[test]
    fn test_flags_word_from_names() {
        let msg = Message::<Doc>::builder(OpCode::Insert)
            .int32("flags", 0x7f)
            .flag("CONTINUE_ON_ERROR", true)
            .cstring("fullCollectionName", "db.c")
            .documents("documents", vec![empty()])
            .build()
            .unwrap();
        assert_eq!(msg.int32("flags"), Some(1));
        assert_eq!(msg.fields()[0].0, "flags");

        let msg = Message::<Doc>::builder(OpCode::Msg)
            .cstring("message", "hi")
            .build()
            .unwrap();
        assert!(!msg.contains("flags"));
    }

    #[test]
    fn test_wrong_shape() {
        let err = Message::<Doc>::builder(OpCode::Insert)
            .document("documents", empty())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        let err = Message::<Doc>::builder(OpCode::Msg)
            .int32("nope", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_unknown_flag() {
        let err = Message::<Doc>::builder(OpCode::Delete)
            .flag("EXHAUST", true)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_wire_order() {
        let msg = Message::<Doc>::builder(OpCode::Update)
            .document("update", empty())
            .document("selector", empty())
            .cstring("fullCollectionName", "db.c")
            .int32("ZERO", 0)
            .flag("MULTI_UPDATE", true)
            .build()
            .unwrap();
        let names: Vec<_> = msg.fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["ZERO", "fullCollectionName", "flags", "selector", "update"]
        );
        assert_eq!(msg.int32("flags"), Some(2));
        assert!(msg.flag("MULTI_UPDATE"));
        assert!(!msg.flag("UPSERT"));
    }

    #[test]
    fn test_kill_cursors_count() {
        let ids = vec![CursorId::from_i64(1), CursorId::from_i64(2)];
        let msg = Message::<Doc>::kill_cursors(ids.clone()).unwrap();
        assert_eq!(msg.int32("numberOfCursorIDs"), Some(2));
        assert_eq!(msg.cursor_ids("cursorIDs"), Some(ids.as_slice()));
    }
}
