//! Document codec collaborator.
//!
//! The wire codec never looks inside documents. It finds each document's
//! extent from its 4-byte little-endian length prefix and hands exactly that
//! span to a [`DocumentCodec`].

use crate::error::{Error, Result};
use crate::protocol::codec::read_i32;

/// Encode/decode contract for embedded documents.
pub trait DocumentCodec {
    /// Decoded document type.
    type Document;

    /// Append one self-describing, length-prefixed blob to `out`.
    fn encode(&self, document: &Self::Document, out: &mut Vec<u8>) -> Result<()>;

    /// Decode exactly one blob. `bytes` spans the whole blob, prefix included.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Document>;
}

impl<C: DocumentCodec + ?Sized> DocumentCodec for &C {
    type Document = C::Document;

    fn encode(&self, document: &Self::Document, out: &mut Vec<u8>) -> Result<()> {
        (**self).encode(document, out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Self::Document> {
        (**self).decode(bytes)
    }
}

/// Pass-through codec that keeps documents as their raw bytes.
///
/// Useful for proxies and for inspecting traffic without a BSON dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueCodec;

impl DocumentCodec for OpaqueCodec {
    type Document = Vec<u8>;

    fn encode(&self, document: &Vec<u8>, out: &mut Vec<u8>) -> Result<()> {
        let (len, _) = read_i32(document)?;
        if usize::try_from(len).ok() != Some(document.len()) {
            return Err(Error::Document(format!(
                "length prefix {len} does not match {} bytes",
                document.len()
            )));
        }
        out.extend_from_slice(document);
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// BSON documents via the `bson` crate.
#[cfg(feature = "bson")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonCodec;

#[cfg(feature = "bson")]
impl DocumentCodec for BsonCodec {
    type Document = bson::Document;

    fn encode(&self, document: &bson::Document, out: &mut Vec<u8>) -> Result<()> {
        document
            .to_writer(out)
            .map_err(|e| Error::Document(format!("BSON encode: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<bson::Document> {
        let mut reader = bytes;
        bson::Document::from_reader(&mut reader)
            .map_err(|e| Error::Document(format!("BSON decode: {e}")))
    }
}
