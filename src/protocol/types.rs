//! Common wire protocol types.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

pub use zerocopy::byteorder::little_endian::I32 as I32LE;

/// Message kind carried in the last header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum OpCode {
    /// Reply to a client request
    Reply = 1,
    /// Free-form diagnostic message
    Msg = 1000,
    /// Update documents
    Update = 2001,
    /// Insert new documents
    Insert = 2002,
    /// Formerly OP_GET_BY_OID
    Reserved = 2003,
    /// Query a collection
    Query = 2004,
    /// Fetch more results from a cursor
    GetMore = 2005,
    /// Delete documents
    Delete = 2006,
    /// Release server-side cursors
    KillCursors = 2007,
    /// Cluster-internal command request
    Command = 2010,
    /// Reply to an OP_COMMAND
    CommandReply = 2011,
}

impl OpCode {
    /// Every opcode the registry knows about.
    pub const ALL: [OpCode; 11] = [
        OpCode::Reply,
        OpCode::Msg,
        OpCode::Update,
        OpCode::Insert,
        OpCode::Reserved,
        OpCode::Query,
        OpCode::GetMore,
        OpCode::Delete,
        OpCode::KillCursors,
        OpCode::Command,
        OpCode::CommandReply,
    ];

    /// Create an OpCode from its raw wire value.
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            1 => Ok(OpCode::Reply),
            1000 => Ok(OpCode::Msg),
            2001 => Ok(OpCode::Update),
            2002 => Ok(OpCode::Insert),
            2003 => Ok(OpCode::Reserved),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            2006 => Ok(OpCode::Delete),
            2007 => Ok(OpCode::KillCursors),
            2010 => Ok(OpCode::Command),
            2011 => Ok(OpCode::CommandReply),
            _ => Err(Error::Schema(format!("unknown opcode {value}"))),
        }
    }

    /// Raw wire value.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Protocol name, e.g. `OP_QUERY`.
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Reply => "OP_REPLY",
            OpCode::Msg => "OP_MSG",
            OpCode::Update => "OP_UPDATE",
            OpCode::Insert => "OP_INSERT",
            OpCode::Reserved => "RESERVED",
            OpCode::Query => "OP_QUERY",
            OpCode::GetMore => "OP_GET_MORE",
            OpCode::Delete => "OP_DELETE",
            OpCode::KillCursors => "OP_KILL_CURSORS",
            OpCode::Command => "OP_COMMAND",
            OpCode::CommandReply => "OP_COMMANDREPLY",
        }
    }
}

impl TryFrom<i32> for OpCode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        Self::from_i32(value)
    }
}

impl From<OpCode> for i32 {
    fn from(value: OpCode) -> Self {
        value.as_i32()
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.as_i32())
    }
}

/// Opaque 8-byte cursor identifier.
///
/// The bytes are carried exactly as they appeared on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromBytes, IntoBytes, KnownLayout, Immutable,
)]
#[repr(transparent)]
pub struct CursorId([u8; 8]);

impl CursorId {
    /// Size of a cursor id on the wire.
    pub const SIZE: usize = 8;

    /// The null cursor (all zero bytes), meaning "no more results".
    pub const NULL: CursorId = CursorId([0; 8]);

    /// Wrap raw wire bytes.
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Encode a numeric id the way servers put it on the wire (little-endian).
    pub const fn from_i64(value: i64) -> Self {
        Self(value.to_le_bytes())
    }

    /// Raw wire bytes.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Interpret the bytes as a little-endian i64.
    pub const fn to_i64(self) -> i64 {
        i64::from_le_bytes(self.0)
    }

    /// Returns true for the null cursor.
    pub fn is_null(&self) -> bool {
        self.0 == [0; 8]
    }
}

impl From<[u8; 8]> for CursorId {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}
