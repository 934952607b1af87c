//! Sample production: ICY metadata demuxing, partial frames and timestamps.
//!
//! The processor owns one transport for the lifetime of a connection. Each
//! [`StreamProcessor::next_sample`] call yields one frame-sized buffer,
//! consuming any metadata block that precedes it. Every await is a
//! `load`; bytes are consumed only after the load completes, so a cancelled
//! or timed-out pull leaves the byte-position counters untouched.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::audio::{provider_for, AudioFormat, AudioProvider, Sample};
use crate::error::{StreamError, StreamResult};
use crate::events::{EventEmitter, StreamEvent};
use crate::metadata::parse_metadata;
use crate::parsers::FrameInfo;
use crate::protocol_constants::{ICY_METADATA_BLOCK_UNIT, SNIFF_WINDOW};
use crate::transport::TransportReader;
use crate::utils::now_millis;

/// Produces timestamped samples from a negotiated transport.
pub struct StreamProcessor {
    transport: Box<dyn TransportReader>,
    provider: &'static dyn AudioProvider,
    emitter: Arc<dyn EventEmitter>,
    /// Bytes between metadata blocks; 0 disables demuxing.
    metadata_interval: usize,
    /// Audio bytes consumed since the last metadata block.
    metadata_pos: usize,
    /// All bytes consumed from the transport, metadata included.
    byte_offset: u64,
    clock: Duration,
    read_timeout: Duration,
    last_activity: Instant,
}

impl StreamProcessor {
    pub fn new(
        transport: Box<dyn TransportReader>,
        format: AudioFormat,
        metadata_interval: usize,
        emitter: Arc<dyn EventEmitter>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            provider: provider_for(format),
            emitter,
            metadata_interval,
            metadata_pos: 0,
            byte_offset: 0,
            clock: Duration::ZERO,
            read_timeout,
            last_activity: Instant::now(),
        }
    }

    /// Continues the presentation clock of a previous processor.
    #[must_use]
    pub fn with_clock(mut self, clock: Duration) -> Self {
        self.clock = clock;
        self
    }

    fn metadata_enabled(&self) -> bool {
        self.metadata_interval > 0
    }

    /// Audio bytes consumed since the last metadata block.
    #[must_use]
    pub fn metadata_position(&self) -> usize {
        self.metadata_pos
    }

    /// Total bytes consumed from the transport.
    #[must_use]
    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// Timestamp the next sample will carry.
    #[must_use]
    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// Returns true if a read succeeded within `window`.
    #[must_use]
    pub fn is_alive(&self, window: Duration) -> bool {
        self.last_activity.elapsed() < window
    }

    /// Closes the underlying transport.
    pub async fn shutdown(&mut self) {
        self.transport.shutdown().await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sample production
    // ─────────────────────────────────────────────────────────────────────────

    /// Produces the next sample.
    ///
    /// When the next metadata boundary is at most one nominal frame away, the
    /// bytes up to it are returned as a partial frame. Otherwise a pending
    /// metadata block is consumed first and a nominal frame is read, clamped
    /// so the metadata position never passes the interval.
    pub async fn next_sample(&mut self, cancel: &CancellationToken) -> StreamResult<Sample> {
        let size = self.provider.sample_size();
        let remaining = self.metadata_interval.saturating_sub(self.metadata_pos);

        let (data, partial) = if self.metadata_enabled() && remaining > 0 && remaining <= size {
            (self.read_audio(remaining, cancel).await?, true)
        } else {
            self.handle_metadata(cancel).await?;
            let count = if self.metadata_enabled() {
                size.min(self.metadata_interval - self.metadata_pos)
            } else {
                size
            };
            (self.read_audio(count, cancel).await?, count < size)
        };

        let sample = self.provider.parse_sample(data, self.clock, partial);
        self.clock += sample.duration;
        Ok(sample)
    }

    /// Consumes the metadata block at the current boundary, if any.
    ///
    /// The length byte is only consumed together with its block.
    async fn handle_metadata(&mut self, cancel: &CancellationToken) -> StreamResult<()> {
        if !self.metadata_enabled() || self.metadata_pos < self.metadata_interval {
            return Ok(());
        }

        if self.load(1, cancel).await? < 1 {
            return Err(StreamError::Disconnected);
        }
        let length = usize::from(self.transport.loaded()[0]) * ICY_METADATA_BLOCK_UNIT;
        if length > 0 && self.load(1 + length, cancel).await? < 1 + length {
            return Err(StreamError::Disconnected);
        }

        self.transport.read_byte()?;
        self.byte_offset += 1;
        if length > 0 {
            let text = self.transport.read_string(length)?;
            self.byte_offset += length as u64;
            self.emit_metadata(&text);
        }
        self.metadata_pos = 0;
        Ok(())
    }

    fn emit_metadata(&self, text: &str) {
        match parse_metadata(text) {
            Ok(track) => {
                log::info!("[Processor] Now playing: {} - {}", track.artist, track.title);
                self.emitter.emit(StreamEvent::MetadataChanged {
                    title: track.title,
                    artist: track.artist,
                    timestamp: now_millis(),
                });
            }
            Err(e) => log::warn!("[Metadata] Ignoring block: {}", e),
        }
    }

    /// Reads `count` audio bytes, which must not cross a metadata boundary.
    async fn read_audio(&mut self, count: usize, cancel: &CancellationToken) -> StreamResult<Bytes> {
        let data = self.read_exact(count, cancel).await?;
        if self.metadata_enabled() {
            self.metadata_pos += count;
        }
        Ok(data)
    }

    async fn read_exact(&mut self, count: usize, cancel: &CancellationToken) -> StreamResult<Bytes> {
        let available = self.load(count, cancel).await?;
        if available < count {
            log::debug!(
                "[Processor] Short read: wanted {} bytes, stream ended after {}",
                count,
                available
            );
            return Err(StreamError::Disconnected);
        }
        let data = self.transport.read_buffer(count)?;
        self.byte_offset += count as u64;
        Ok(data)
    }

    /// Loads bytes, honouring cancellation and the read timeout.
    async fn load(&mut self, count: usize, cancel: &CancellationToken) -> StreamResult<usize> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            result = tokio::time::timeout(self.read_timeout, self.transport.load(count)) => result,
        };

        let available = result.map_err(|_| StreamError::Timeout)??;
        if available > 0 {
            self.last_activity = Instant::now();
        }
        Ok(available)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audio property detection
    // ─────────────────────────────────────────────────────────────────────────

    /// Detects audio properties from the bitstream.
    ///
    /// Scans for a frame sync, then requires the header one frame later to
    /// decode and agree before accepting. The first frame is discarded and
    /// the agreeing header is left unconsumed, so the next sample starts on
    /// it. Metadata blocks met while scanning are handled normally. Only
    /// sync candidates inside the first [`SNIFF_WINDOW`] bytes are tried.
    pub async fn detect(&mut self, cancel: &CancellationToken) -> StreamResult<FrameInfo> {
        let provider = self.provider;
        let header_len = provider.header_length();
        let mut buf: Vec<u8> = Vec::with_capacity(4096);
        let mut start = 0;

        loop {
            if start + header_len > SNIFF_WINDOW {
                return Err(StreamError::Decode(format!(
                    "no frame sync within {SNIFF_WINDOW} bytes"
                )));
            }
            self.fill_audio(&mut buf, start + header_len, cancel).await?;

            let first = provider
                .is_frame_sync(buf[start], buf[start + 1])
                .then(|| provider.grab_frame_info(&buf[start..start + header_len]))
                .flatten();

            if let Some(first) = first {
                let end = start + first.frame_length;
                self.fill_audio(&mut buf, end, cancel).await?;

                // A longer earlier candidate may already have consumed past `end`.
                let aligned = buf.len() == end;
                let successor = if aligned {
                    self.peek_audio(header_len, cancel).await?
                } else {
                    self.fill_audio(&mut buf, end + header_len, cancel).await?;
                    buf[end..end + header_len].to_vec()
                };

                let second = provider.grab_frame_info(&successor);
                if let Some(second) = second.filter(|s| first.agrees_with(s)) {
                    if !aligned {
                        self.fill_audio(&mut buf, end + second.frame_length, cancel)
                            .await?;
                    }
                    log::debug!(
                        "[Processor] Frame sync after {} bytes: {} Hz, {} ch",
                        start,
                        first.sample_rate,
                        first.channels
                    );
                    return Ok(first);
                }
            }
            start += 1;
        }
    }

    /// Reads audio bytes into `buf` until it holds `target` bytes.
    async fn fill_audio(
        &mut self,
        buf: &mut Vec<u8>,
        target: usize,
        cancel: &CancellationToken,
    ) -> StreamResult<()> {
        while buf.len() < target {
            self.handle_metadata(cancel).await?;
            let wanted = target - buf.len();
            let count = if self.metadata_enabled() {
                wanted.min(self.metadata_interval - self.metadata_pos)
            } else {
                wanted
            };
            let data = self.read_audio(count, cancel).await?;
            buf.extend_from_slice(&data);
        }
        Ok(())
    }

    /// Returns the next `count` audio bytes without consuming them.
    ///
    /// A pending metadata block at the boundary is consumed first; one that
    /// falls inside the peeked range is skipped over in place.
    async fn peek_audio(
        &mut self,
        count: usize,
        cancel: &CancellationToken,
    ) -> StreamResult<Vec<u8>> {
        self.handle_metadata(cancel).await?;
        let before = if self.metadata_enabled() {
            self.metadata_interval - self.metadata_pos
        } else {
            count
        };

        if count <= before {
            if self.load(count, cancel).await? < count {
                return Err(StreamError::Disconnected);
            }
            return Ok(self.transport.loaded()[..count].to_vec());
        }

        if self.load(before + 1, cancel).await? < before + 1 {
            return Err(StreamError::Disconnected);
        }
        let block = usize::from(self.transport.loaded()[before]) * ICY_METADATA_BLOCK_UNIT;
        let total = before + 1 + block + (count - before);
        if self.load(total, cancel).await? < total {
            return Err(StreamError::Disconnected);
        }
        let loaded = self.transport.loaded();
        let mut out = loaded[..before].to_vec();
        out.extend_from_slice(&loaded[before + 1 + block..total]);
        Ok(out)
    }
}
