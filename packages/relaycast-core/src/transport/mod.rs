//! Byte transport between the socket and the stream processor.
//!
//! A [`TransportReader`] buffers bytes in two steps: `load` suspends until
//! enough bytes are available, then the synchronous `read_*` methods consume
//! them. Two variants exist:
//!
//! - [`IdentityTransport`]: reads pass straight through to the socket
//! - [`ChunkedTransport`]: a background task strips HTTP chunk framing
//!
//! [`select_transport`] picks one from the `Transfer-Encoding` header.

mod chunked;
mod identity;

pub use chunked::ChunkedTransport;
pub use identity::IdentityTransport;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncRead;

use crate::config::InitialBuffering;
use crate::error::{TransportError, TransportResult};
use crate::utils::find_ignore_ascii_case;

/// Buffered reader over a stream connection.
///
/// Consuming reads fail with [`TransportError::Disconnected`] when fewer
/// bytes are loaded than requested; callers `load` first.
#[async_trait]
pub trait TransportReader: Send {
    /// Ensures at least `count` bytes are loaded.
    ///
    /// Returns the number of bytes available, capped at `count`. A value
    /// below `count` means the stream ended.
    async fn load(&mut self, count: usize) -> TransportResult<usize>;

    /// Closes the connection. Safe to call more than once.
    async fn shutdown(&mut self);

    /// Loaded bytes not yet consumed.
    fn loaded(&mut self) -> &mut BytesMut;

    /// Number of loaded bytes not yet consumed.
    fn unconsumed(&mut self) -> usize {
        self.loaded().len()
    }

    fn read_byte(&mut self) -> TransportResult<u8> {
        let loaded = self.loaded();
        if loaded.is_empty() {
            return Err(TransportError::Disconnected);
        }
        Ok(loaded.get_u8())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> TransportResult<()> {
        let loaded = self.loaded();
        if loaded.len() < buf.len() {
            return Err(TransportError::Disconnected);
        }
        loaded.copy_to_slice(buf);
        Ok(())
    }

    fn read_buffer(&mut self, count: usize) -> TransportResult<Bytes> {
        let loaded = self.loaded();
        if loaded.len() < count {
            return Err(TransportError::Disconnected);
        }
        Ok(loaded.split_to(count).freeze())
    }

    /// Reads `count` bytes as text; invalid UTF-8 is replaced.
    fn read_string(&mut self, count: usize) -> TransportResult<String> {
        let bytes = self.read_buffer(count)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Returns true if a `Transfer-Encoding` value selects chunked framing.
#[must_use]
pub fn is_chunked(transfer_encoding: Option<&str>) -> bool {
    transfer_encoding.is_some_and(|value| find_ignore_ascii_case(value, "chunked").is_some())
}

/// Chooses the transport variant for a negotiated connection.
///
/// Bytes already buffered by `identity` while reading the response head are
/// carried over into the chunked decoder.
pub fn select_transport<S>(
    identity: IdentityTransport<S>,
    transfer_encoding: Option<&str>,
    buffering: InitialBuffering,
) -> Box<dyn TransportReader>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    if is_chunked(transfer_encoding) {
        log::debug!("[Transport] Using chunked transfer decoding ({:?})", buffering);
        Box::new(identity.into_chunked(buffering))
    } else {
        Box::new(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detects_chunked_encoding() {
        assert!(is_chunked(Some("chunked")));
        assert!(is_chunked(Some("gzip, Chunked")));
        assert!(!is_chunked(Some("identity")));
        assert!(!is_chunked(None));
    }

    #[tokio::test]
    async fn factory_decodes_chunked_bodies() {
        let body = crate::test_fixtures::chunk_encode(b"hello world", 4);
        let identity = IdentityTransport::new(Cursor::new(body));
        let mut reader = select_transport(identity, Some("chunked"), InitialBuffering::Disabled);

        assert_eq!(reader.load(11).await.unwrap(), 11);
        assert_eq!(reader.read_string(11).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn factory_passes_identity_through() {
        let identity = IdentityTransport::new(Cursor::new(b"5\r\nhello".to_vec()));
        let mut reader = select_transport(identity, None, InitialBuffering::default());

        assert_eq!(reader.load(8).await.unwrap(), 8);
        assert_eq!(reader.read_string(8).unwrap(), "5\r\nhello");
    }
}
