//! MongoDB wire protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `header`: the fixed 16-byte message header
//! - `schema`: per-opcode field layouts
//! - `flags`: named bits of the `flags` field
//! - `serialize`: message → bytes
//! - `codec`: Low-level encoding/decoding primitives
//! - `types`: Common protocol types (OpCode, CursorId)

pub mod codec;
pub mod flags;
pub mod header;
pub mod schema;
pub mod serialize;
pub mod types;

// Re-export commonly used types
pub use header::{HEADER_SIZE, MessageHeader, decode_header, encode_header};
pub use schema::{Cardinality, FieldSpec, FieldType, schema_for};
pub use serialize::{serialize, write_message};
pub use types::{CursorId, OpCode};
