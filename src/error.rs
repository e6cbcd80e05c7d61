//! Error types for zero-mongo.

use thiserror::Error;

/// Result type for zero-mongo operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for zero-mongo.
///
/// Running out of input is not an error: the parser reports it as
/// [`Progress::NeedMoreData`](crate::state::parse::Progress::NeedMoreData).
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown opcode, unknown field type, or a field/flag that does not
    /// belong to the opcode's schema.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A required field was absent when building or serializing a message.
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// Protocol error (malformed message, inconsistent lengths, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The document codec rejected a payload
    #[error("Document codec error: {0}")]
    Document(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Invalid usage (e.g., malformed connection URL)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

impl Error {
    /// Returns true if the error leaves a connection's byte stream in an unknown
    /// position, so the connection cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionClosed | Error::Protocol(_) | Error::Document(_)
        )
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}
