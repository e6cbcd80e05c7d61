//! Per-opcode field layouts.
//!
//! Each opcode maps to an ordered list of [`FieldSpec`]s. The order is the
//! wire order and is never rearranged.

use crate::error::{Error, Result};

use super::types::OpCode;

/// Name of the Int32 field whose bits carry the named flags.
pub const FLAGS_FIELD: &str = "flags";

/// Wire type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Little-endian i32
    Int32,
    /// Opaque 8-byte value (cursor ids)
    Int64,
    /// NUL-terminated UTF-8 string
    CString,
    /// Length-prefixed document handled by the document codec
    Document,
}

/// Whether a field holds one value or runs to the end of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one value
    Scalar,
    /// Zero or more values up to the end of the message
    Array,
}

/// Layout of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name
    pub name: &'static str,
    /// Wire type
    pub ty: FieldType,
    /// One value or a trailing sequence
    pub cardinality: Cardinality,
    /// May be omitted entirely
    pub optional: bool,
}

impl FieldSpec {
    const fn scalar(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            cardinality: Cardinality::Scalar,
            optional: false,
        }
    }

    const fn array(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            cardinality: Cardinality::Array,
            optional: false,
        }
    }

    const fn optional(self) -> Self {
        Self {
            optional: true,
            ..self
        }
    }

    /// Returns true if this is the flags field.
    pub fn is_flags(&self) -> bool {
        self.ty == FieldType::Int32 && self.name == FLAGS_FIELD
    }

    /// Returns true if this is an array field.
    pub fn is_array(&self) -> bool {
        self.cardinality == Cardinality::Array
    }
}

use FieldType::{CString, Document, Int32, Int64};

const REPLY: &[FieldSpec] = &[
    FieldSpec::scalar("flags", Int32),
    FieldSpec::scalar("cursorID", Int64),
    FieldSpec::scalar("startingFrom", Int32),
    FieldSpec::scalar("numberReturned", Int32),
    FieldSpec::array("documents", Document),
];

const MSG: &[FieldSpec] = &[FieldSpec::scalar("message", CString)];

const UPDATE: &[FieldSpec] = &[
    FieldSpec::scalar("ZERO", Int32),
    FieldSpec::scalar("fullCollectionName", CString),
    FieldSpec::scalar("flags", Int32),
    FieldSpec::scalar("selector", Document),
    FieldSpec::scalar("update", Document),
];

const INSERT: &[FieldSpec] = &[
    FieldSpec::scalar("flags", Int32),
    FieldSpec::scalar("fullCollectionName", CString),
    FieldSpec::array("documents", Document),
];

const RESERVED: &[FieldSpec] = &[];

const QUERY: &[FieldSpec] = &[
    FieldSpec::scalar("flags", Int32),
    FieldSpec::scalar("fullCollectionName", CString),
    FieldSpec::scalar("numberToSkip", Int32),
    FieldSpec::scalar("numberToReturn", Int32),
    FieldSpec::scalar("query", Document),
    FieldSpec::array("returnFieldsSelector", Document).optional(),
];

const GET_MORE: &[FieldSpec] = &[
    FieldSpec::scalar("ZERO", Int32),
    FieldSpec::scalar("fullCollectionName", CString),
    FieldSpec::scalar("numberToReturn", Int32),
    FieldSpec::scalar("cursorID", Int64),
];

const DELETE: &[FieldSpec] = &[
    FieldSpec::scalar("ZERO", Int32),
    FieldSpec::scalar("fullCollectionName", CString),
    FieldSpec::scalar("flags", Int32),
    FieldSpec::scalar("selector", Document),
];

const KILL_CURSORS: &[FieldSpec] = &[
    FieldSpec::scalar("ZERO", Int32),
    FieldSpec::scalar("numberOfCursorIDs", Int32),
    FieldSpec::array("cursorIDs", Int64),
];

const COMMAND: &[FieldSpec] = &[
    FieldSpec::scalar("database", CString),
    FieldSpec::scalar("commandName", CString),
    FieldSpec::scalar("metadata", Document),
    FieldSpec::scalar("commandArgs", Document),
    FieldSpec::scalar("inputDocs", Document),
];

const COMMAND_REPLY: &[FieldSpec] = &[
    FieldSpec::scalar("metadata", Document),
    FieldSpec::scalar("commandReply", Document),
    FieldSpec::scalar("outputDocs", Document),
];

/// Ordered field layout for an opcode.
///
/// Every [`OpCode`] is registered; raw values outside the table are rejected
/// by [`OpCode::from_i32`] with [`Error::Schema`].
pub fn schema_for(op_code: OpCode) -> &'static [FieldSpec] {
    match op_code {
        OpCode::Reply => REPLY,
        OpCode::Msg => MSG,
        OpCode::Update => UPDATE,
        OpCode::Insert => INSERT,
        OpCode::Reserved => RESERVED,
        OpCode::Query => QUERY,
        OpCode::GetMore => GET_MORE,
        OpCode::Delete => DELETE,
        OpCode::KillCursors => KILL_CURSORS,
        OpCode::Command => COMMAND,
        OpCode::CommandReply => COMMAND_REPLY,
    }
}

/// Look up a single field of an opcode by name.
pub fn field_spec(op_code: OpCode, name: &str) -> Result<&'static FieldSpec> {
    schema_for(op_code)
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| Error::Schema(format!("{op_code} has no field '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_opcode_registered() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_i32(op.as_i32()).unwrap(), op);
        }
        assert!(schema_for(OpCode::Reserved).is_empty());
        assert_eq!(schema_for(OpCode::KillCursors).len(), 3);
    }

    #[test]
    fn test_unregistered_opcode() {
        assert!(matches!(OpCode::from_i32(2013), Err(Error::Schema(_))));
        assert!(matches!(OpCode::from_i32(0), Err(Error::Schema(_))));
    }

    #[test]
    fn test_query_layout() {
        let names: Vec<_> = schema_for(OpCode::Query)
            .iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            [
                "flags",
                "fullCollectionName",
                "numberToSkip",
                "numberToReturn",
                "query",
                "returnFieldsSelector"
            ]
        );

        let selector = field_spec(OpCode::Query, "returnFieldsSelector").unwrap();
        assert!(selector.optional);
        assert!(selector.is_array());
        assert_eq!(selector.ty, FieldType::Document);
    }

    #[test]
    fn test_flags_field() {
        assert!(field_spec(OpCode::Delete, "flags").unwrap().is_flags());
        assert!(!field_spec(OpCode::Delete, "ZERO").unwrap().is_flags());
        assert!(field_spec(OpCode::Delete, "documents").is_err());
    }
}
