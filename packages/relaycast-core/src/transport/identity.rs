use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ChunkedTransport, TransportReader};
use crate::config::InitialBuffering;
use crate::error::TransportResult;

const READ_CHUNK: usize = 8 * 1024;

/// Pass-through transport over a socket's buffered reader.
pub struct IdentityTransport<S> {
    stream: Option<S>,
    buffer: BytesMut,
}

impl<S> IdentityTransport<S>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Hands the socket and any over-read bytes to a chunked decoder.
    pub fn into_chunked(mut self, buffering: InitialBuffering) -> ChunkedTransport {
        let leftover = std::mem::take(&mut self.buffer);
        match self.stream.take() {
            Some(stream) => ChunkedTransport::spawn(stream, leftover, buffering),
            None => ChunkedTransport::closed(),
        }
    }
}

#[async_trait]
impl<S> TransportReader for IdentityTransport<S>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    async fn load(&mut self, count: usize) -> TransportResult<usize> {
        while self.buffer.len() < count {
            let Some(stream) = self.stream.as_mut() else {
                break;
            };
            self.buffer.reserve(READ_CHUNK.max(count - self.buffer.len()));
            if stream.read_buf(&mut self.buffer).await? == 0 {
                log::debug!("[Transport] Server closed the connection");
                self.stream = None;
            }
        }
        Ok(self.buffer.len().min(count))
    }

    async fn shutdown(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("[Transport] Identity transport closed");
        }
    }

    fn loaded(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }
}
