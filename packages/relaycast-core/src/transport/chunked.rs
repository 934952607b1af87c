use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use super::TransportReader;
use crate::config::InitialBuffering;
use crate::error::{TransportError, TransportResult};
use crate::protocol_constants::{MAX_CHUNK_LINE_LEN, MAX_CHUNK_SIZE};

/// Reassembled payload shared between the decoder task and the reader.
#[derive(Default)]
struct Shared {
    payload: BytesMut,
    /// Total payload bytes decoded so far.
    total: usize,
    finished: bool,
    error: Option<TransportError>,
}

/// One-shot gate that withholds reads until initial buffering completes.
///
/// Starts with no permits; opening adds the single permit that every
/// subsequent acquire borrows and returns.
struct BufferingGate {
    semaphore: Semaphore,
    opened: AtomicBool,
}

impl BufferingGate {
    fn new() -> Self {
        Self {
            semaphore: Semaphore::new(0),
            opened: AtomicBool::new(false),
        }
    }

    fn open(&self) {
        if !self.opened.swap(true, Ordering::SeqCst) {
            self.semaphore.add_permits(1);
        }
    }

    fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        // Err only if the semaphore is closed, which never happens.
        let _permit = self.semaphore.acquire().await;
    }
}

/// Transport that decodes HTTP chunked transfer encoding in the background.
///
/// The decoder task drains the socket into a shared buffer; `load` moves
/// reassembled payload into the reader's own view once the buffering gate
/// has opened.
pub struct ChunkedTransport {
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
    gate: Arc<BufferingGate>,
    cancel: CancellationToken,
    loaded: BytesMut,
}

impl ChunkedTransport {
    /// Starts decoding `stream`, beginning with bytes already read from it.
    pub(super) fn spawn<S>(stream: S, leftover: BytesMut, buffering: InitialBuffering) -> Self
    where
        S: AsyncRead + Unpin + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let notify = Arc::new(Notify::new());
        let gate = Arc::new(BufferingGate::new());
        let cancel = CancellationToken::new();

        let threshold = match buffering {
            InitialBuffering::Threshold { bytes } => Some(bytes),
            InitialBuffering::Delay { ms } => {
                let gate = Arc::clone(&gate);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                            log::debug!("[Transport] Buffering delay of {}ms elapsed", ms);
                            gate.open();
                        }
                    }
                });
                None
            }
            InitialBuffering::Disabled => {
                gate.open();
                None
            }
        };

        let decoder = ChunkDecoder {
            stream,
            raw: leftover,
        };
        let task_shared = Arc::clone(&shared);
        let task_notify = Arc::clone(&notify);
        let task_gate = Arc::clone(&gate);
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = task_cancel.cancelled() => Ok(()),
                result = decoder.run(&task_shared, &task_notify, &task_gate, threshold) => result,
            };

            {
                let mut state = task_shared.lock();
                state.finished = true;
                if let Err(e) = result {
                    log::debug!("[Transport] Chunk decoder stopped: {}", e);
                    state.error = Some(e);
                }
            }
            task_gate.open();
            task_notify.notify_one();
        });

        Self {
            shared,
            notify,
            gate,
            cancel,
            loaded: BytesMut::new(),
        }
    }

    /// A transport whose socket is already gone.
    pub(super) fn closed() -> Self {
        let shared = Shared {
            finished: true,
            ..Default::default()
        };
        let gate = Arc::new(BufferingGate::new());
        gate.open();
        Self {
            shared: Arc::new(Mutex::new(shared)),
            notify: Arc::new(Notify::new()),
            gate,
            cancel: CancellationToken::new(),
            loaded: BytesMut::new(),
        }
    }

    /// Total payload bytes decoded so far, including bytes not yet loaded.
    pub fn decoded_total(&self) -> usize {
        self.shared.lock().total
    }
}

#[async_trait]
impl TransportReader for ChunkedTransport {
    async fn load(&mut self, count: usize) -> TransportResult<usize> {
        if !self.gate.is_open() {
            self.gate.wait().await;
        }

        loop {
            {
                let mut shared = self.shared.lock();
                if !shared.payload.is_empty() {
                    let decoded = shared.payload.split();
                    self.loaded.unsplit(decoded);
                }
                if self.loaded.len() >= count {
                    return Ok(count);
                }
                if shared.finished {
                    if let Some(e) = shared.error.take() {
                        return Err(e);
                    }
                    return Ok(self.loaded.len());
                }
            }
            self.notify.notified().await;
        }
    }

    async fn shutdown(&mut self) {
        if !self.cancel.is_cancelled() {
            log::debug!("[Transport] Chunked transport closed");
            self.cancel.cancel();
        }
    }

    fn loaded(&mut self) -> &mut BytesMut {
        &mut self.loaded
    }
}

impl Drop for ChunkedTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Appends decoded payload to the shared buffer and wakes the reader.
fn publish(
    shared: &Mutex<Shared>,
    notify: &Notify,
    gate: &BufferingGate,
    threshold: Option<usize>,
    payload: &[u8],
) {
    let total = {
        let mut state = shared.lock();
        state.payload.extend_from_slice(payload);
        state.total += payload.len();
        state.total
    };
    if threshold.is_some_and(|t| total >= t) && !gate.is_open() {
        log::debug!("[Transport] Initial buffering complete ({} bytes)", total);
        gate.open();
    }
    notify.notify_one();
}

/// Parses chunk-size lines and payloads from the raw socket.
struct ChunkDecoder<S> {
    stream: S,
    raw: BytesMut,
}

impl<S> ChunkDecoder<S>
where
    S: AsyncRead + Unpin + Send,
{
    async fn run(
        mut self,
        shared: &Mutex<Shared>,
        notify: &Notify,
        gate: &BufferingGate,
        threshold: Option<usize>,
    ) -> TransportResult<()> {
        loop {
            let line = self.read_line().await?;
            let size_field = line.split(';').next().unwrap_or("").trim();
            let size = usize::from_str_radix(size_field, 16)
                .map_err(|_| TransportError::InvalidChunk(line.clone()))?;
            if size > MAX_CHUNK_SIZE {
                return Err(TransportError::InvalidChunk(format!(
                    "chunk of {size} bytes exceeds {MAX_CHUNK_SIZE}"
                )));
            }

            if size == 0 {
                log::debug!("[Transport] Received terminating chunk");
                return Ok(());
            }

            // Payload is published as it arrives, not once the chunk is complete.
            let mut remaining = size;
            while remaining > 0 {
                if self.raw.is_empty() {
                    self.fill().await?;
                }
                let take = remaining.min(self.raw.len());
                let payload = self.raw.split_to(take);
                remaining -= take;
                publish(shared, notify, gate, threshold, &payload);
            }

            self.fill_to(2).await?;
            if &self.raw[..2] != b"\r\n" {
                return Err(TransportError::InvalidChunk(
                    "chunk payload not followed by CRLF".to_string(),
                ));
            }
            self.raw.advance(2);
        }
    }

    /// Reads one CRLF-terminated line, without the terminator.
    async fn read_line(&mut self) -> TransportResult<String> {
        loop {
            if let Some(pos) = self.raw.windows(2).position(|w| w == b"\r\n") {
                let line = self.raw.split_to(pos);
                self.raw.advance(2);
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if self.raw.len() > MAX_CHUNK_LINE_LEN {
                return Err(TransportError::InvalidChunk(
                    "chunk-size line too long".to_string(),
                ));
            }
            self.fill().await?;
        }
    }

    async fn fill_to(&mut self, count: usize) -> TransportResult<()> {
        while self.raw.len() < count {
            self.fill().await?;
        }
        Ok(())
    }

    async fn fill(&mut self) -> TransportResult<()> {
        self.raw.reserve(8 * 1024);
        if self.stream.read_buf(&mut self.raw).await? == 0 {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{chunk_encode, mp3_frames};
    use crate::transport::IdentityTransport;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;

    fn chunked(body: Vec<u8>, buffering: InitialBuffering) -> ChunkedTransport {
        IdentityTransport::new(Cursor::new(body)).into_chunked(buffering)
    }

    #[tokio::test]
    async fn reassembles_lowercase_hex_chunks() {
        let payload = mp3_frames(5);
        // 0x1a2 and friends exercise lower-case hex digits
        let body = chunk_encode(&payload, 418);
        assert!(String::from_utf8_lossy(&body).starts_with("1a2\r\n"));

        let mut transport = chunked(body, InitialBuffering::Disabled);
        assert_eq!(transport.load(payload.len()).await.unwrap(), payload.len());
        assert_eq!(transport.read_buffer(payload.len()).unwrap().as_ref(), &payload[..]);

        // terminating chunk reached: nothing more
        assert_eq!(transport.load(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ignores_chunk_extensions() {
        let body = b"5;name=value\r\nhello\r\n6\r\n world\r\n0\r\n\r\n".to_vec();
        let mut transport = chunked(body, InitialBuffering::Disabled);
        assert_eq!(transport.load(11).await.unwrap(), 11);
        assert_eq!(transport.read_string(11).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn starts_from_bytes_read_with_the_head() {
        let leftover = BytesMut::from(&b"3\r\nab"[..]);
        let mut transport = ChunkedTransport::spawn(
            Cursor::new(b"c\r\n0\r\n\r\n".to_vec()),
            leftover,
            InitialBuffering::Disabled,
        );
        assert_eq!(transport.load(3).await.unwrap(), 3);
        assert_eq!(transport.read_string(3).unwrap(), "abc");
    }

    #[tokio::test]
    async fn invalid_size_line_is_an_error() {
        let mut transport = chunked(b"zz\r\nhello\r\n".to_vec(), InitialBuffering::Disabled);
        assert!(matches!(
            transport.load(5).await,
            Err(TransportError::InvalidChunk(_))
        ));
    }

    #[tokio::test]
    async fn truncated_stream_reports_disconnection() {
        let mut transport = chunked(b"a\r\nhello".to_vec(), InitialBuffering::Disabled);
        assert!(matches!(
            transport.load(10).await,
            Err(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn threshold_gate_withholds_until_reached() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut transport = IdentityTransport::new(server)
            .into_chunked(InitialBuffering::Threshold { bytes: 100 });

        client.write_all(&chunk_encode(&[7u8; 50], 50)[..56]).await.unwrap();
        let early = tokio::time::timeout(Duration::from_millis(50), transport.load(1)).await;
        assert!(early.is_err(), "gate opened before threshold");

        client.write_all(b"32\r\n").await.unwrap();
        client.write_all(&[8u8; 50]).await.unwrap();
        client.write_all(b"\r\n").await.unwrap();

        assert_eq!(transport.load(100).await.unwrap(), 100);
        let data = transport.read_buffer(100).unwrap();
        assert_eq!(&data[..50], &[7u8; 50]);
        assert_eq!(&data[50..], &[8u8; 50]);
        assert_eq!(transport.decoded_total(), 100);
    }

    #[tokio::test]
    async fn partial_chunk_payload_is_readable() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let mut transport = IdentityTransport::new(server).into_chunked(InitialBuffering::Disabled);

        // announce 64 KiB but deliver only part of it
        client.write_all(b"10000\r\n").await.unwrap();
        client.write_all(&[5u8; 20_000]).await.unwrap();

        let loaded = tokio::time::timeout(Duration::from_secs(5), transport.load(1000))
            .await
            .expect("payload withheld until chunk end");
        assert_eq!(loaded.unwrap(), 1000);
        assert_eq!(transport.read_buffer(1000).unwrap().as_ref(), &[5u8; 1000][..]);

        let loaded = tokio::time::timeout(Duration::from_secs(5), transport.load(19_000))
            .await
            .unwrap();
        assert_eq!(loaded.unwrap(), 19_000);
        assert_eq!(transport.decoded_total(), 20_000);
    }

    #[tokio::test]
    async fn oversized_chunk_is_rejected() {
        let mut transport = chunked(
            b"ffffffffffffffff\r\nhello\r\n".to_vec(),
            InitialBuffering::Disabled,
        );
        assert!(matches!(
            transport.load(5).await,
            Err(TransportError::InvalidChunk(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_gate_opens_after_timer() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut transport =
            IdentityTransport::new(server).into_chunked(InitialBuffering::Delay { ms: 3000 });
        client.write_all(b"5\r\nhello\r\n").await.unwrap();

        let start = tokio::time::Instant::now();
        assert_eq!(transport.load(5).await.unwrap(), 5);
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn gate_opens_when_stream_ends_early() {
        let body = chunk_encode(b"tiny", 4);
        let mut transport = chunked(body, InitialBuffering::Threshold { bytes: 10_000 });
        assert_eq!(transport.load(100).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (_client, server) = tokio::io::duplex(64);
        let mut transport = IdentityTransport::new(server).into_chunked(InitialBuffering::Disabled);
        transport.shutdown().await;
        transport.shutdown().await;
        assert_eq!(transport.load(1).await.unwrap(), 0);
    }
}
