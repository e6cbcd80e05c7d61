//! An incremental MongoDB wire protocol codec.
//!
//! # Features
//!
//! - **Chunk-agnostic parsing**: [`ParseState`] reassembles a message from byte
//!   chunks split at any position and keeps bytes of the next message aside
//! - **Sans-I/O core**: the parser and serializer never touch a socket
//! - **Pluggable documents**: embedded documents go through a [`DocumentCodec`];
//!   [`BsonCodec`] is provided behind the `bson` feature
//! - **Sync and async drivers**: optional blocking and tokio connections
//!
//! # Example
//!
//! ```
//! use zero_mongo::{Message, OpaqueCodec, ParseState, Progress, serialize};
//!
//! fn main() -> zero_mongo::Result<()> {
//!     let empty = vec![5, 0, 0, 0, 0];
//!     let msg = Message::delete("test.test", empty)?;
//!     let bytes = serialize(&msg, &OpaqueCodec)?;
//!     assert_eq!(bytes.len(), 39);
//!
//!     let mut state = ParseState::new(OpaqueCodec);
//!     for chunk in bytes.chunks(7) {
//!         if let Progress::Complete(parsed) = state.feed(chunk)? {
//!             assert_eq!(parsed.cstring("fullCollectionName"), Some("test.test"));
//!         }
//!     }
//!     assert!(state.is_finished());
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod message;
pub mod opts;
pub mod protocol;
pub mod state;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(feature = "bson")]
pub use document::BsonCodec;
pub use document::{DocumentCodec, OpaqueCodec};
pub use error::{Error, Result};
pub use message::{FieldValue, Message, MessageBuilder};
pub use opts::Opts;
pub use protocol::{CursorId, MessageHeader, OpCode, serialize, write_message};
pub use state::{ParseState, Progress};
