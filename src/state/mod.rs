//! Sans-I/O state machines for the wire protocol.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! The caller owns the transport and feeds them whatever bytes it has.

pub mod parse;

pub use parse::{ParseState, Progress};
