//! Public stream session with transparent reconnect.
//!
//! A [`StreamSession`] negotiates a connection, detects audio properties once
//! and then serves samples on demand. When a pull fails because the stream
//! dropped, the session reconnects exactly once with the original URL and
//! settings, raises [`StreamEvent::Reconnected`] and retries the pull. A
//! second consecutive failure is returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::audio::{AudioInfo, Sample, StationInfo};
use crate::config::ConnectionSettings;
use crate::error::{ConnectError, ConnectResult, StreamError, StreamResult};
use crate::events::{EventEmitter, NoopEventEmitter, StreamEvent};
use crate::http::{negotiate, IceAudioInfo, Negotiated};
use crate::processor::StreamProcessor;
use crate::utils::now_millis;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reading,
    Reconnecting,
}

/// A connected stream serving timestamped samples.
pub struct StreamSession {
    /// URL passed to `connect`; reconnects replay it.
    url: Url,
    /// URL that answered after redirects.
    resolved_url: Url,
    settings: ConnectionSettings,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
    station: StationInfo,
    audio: AudioInfo,
    metadata_interval: usize,
    processor: Option<StreamProcessor>,
    /// Clock carried over while no processor exists.
    clock: Duration,
    disposed: bool,
}

impl StreamSession {
    /// Connects to `url` and detects the stream's audio properties.
    ///
    /// Emits [`StreamEvent::StationInfoChanged`] once connected.
    pub async fn connect(
        url: &str,
        settings: ConnectionSettings,
        emitter: Arc<dyn EventEmitter>,
    ) -> ConnectResult<Self> {
        settings.validate().map_err(ConnectError::InvalidSettings)?;
        let url = Url::parse(url).map_err(|e| ConnectError::InvalidUrl(format!("{url}: {e}")))?;
        let cancel = CancellationToken::new();

        log::info!("[Session] Connecting to {}", url);
        let negotiated = negotiate(&url, &settings).await?;
        let Negotiated {
            url: resolved_url,
            station,
            format,
            declared_bit_rate,
            ice_audio_info,
            metadata_interval,
            transport,
        } = negotiated;

        let mut processor = StreamProcessor::new(
            transport,
            format,
            metadata_interval,
            Arc::clone(&emitter),
            settings.read_timeout(),
        );

        let audio = match (ice_audio_info, declared_bit_rate) {
            (
                Some(IceAudioInfo {
                    sample_rate: Some(sample_rate),
                    channels: Some(channels),
                    ..
                }),
                Some(bit_rate),
            ) => AudioInfo {
                format,
                sample_rate,
                channels,
                bit_rate,
            },
            _ => {
                let frame = processor.detect(&cancel).await?;
                let bit_rate = declared_bit_rate
                    .or(frame.bit_rate_kbps)
                    .ok_or(ConnectError::UnknownBitRate)?;
                AudioInfo {
                    format,
                    sample_rate: frame.sample_rate,
                    channels: frame.channels,
                    bit_rate,
                }
            }
        };

        log::info!(
            "[Session] Streaming {} {} Hz, {} ch, {} kbps from {}",
            audio.format,
            audio.sample_rate,
            audio.channels,
            audio.bit_rate,
            resolved_url
        );
        emitter.emit(StreamEvent::StationInfoChanged {
            station: station.clone(),
            audio,
            timestamp: now_millis(),
        });

        Ok(Self {
            url,
            resolved_url,
            settings,
            emitter,
            cancel,
            state: watch::Sender::new(SessionState::Connected),
            station,
            audio,
            metadata_interval,
            processor: Some(processor),
            clock: Duration::ZERO,
            disposed: false,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change, including those made
    /// while a pull or reconnect is in flight.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn audio_info(&self) -> AudioInfo {
        self.audio
    }

    #[must_use]
    pub fn station_info(&self) -> &StationInfo {
        &self.station
    }

    /// Bytes between metadata blocks on the current connection; 0 if none.
    #[must_use]
    pub fn metadata_interval(&self) -> usize {
        self.metadata_interval
    }

    /// URL passed to `connect`.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL that served the current connection, after redirects.
    #[must_use]
    pub fn resolved_url(&self) -> &Url {
        &self.resolved_url
    }

    /// Presentation time of the next sample.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.processor.as_ref().map_or(self.clock, StreamProcessor::clock)
    }

    /// Token cancelled by [`disconnect`](Self::disconnect).
    ///
    /// Cancelling it from another task aborts an in-flight pull.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns false if no bytes arrived within the liveness window.
    ///
    /// A supervisor can answer `false` with [`reconnect`](Self::reconnect).
    #[must_use]
    pub fn poll_connection(&self) -> bool {
        let window = self.settings.liveness_window();
        self.processor
            .as_ref()
            .is_some_and(|processor| processor.is_alive(window))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sample pull
    // ─────────────────────────────────────────────────────────────────────────

    /// Pulls the next sample, reconnecting once if the stream dropped.
    pub async fn next_sample(&mut self) -> StreamResult<Sample> {
        let cancel = self.cancel.clone();
        self.next_sample_with(&cancel).await
    }

    /// Like [`next_sample`](Self::next_sample) but aborts when `cancel` fires.
    ///
    /// A cancelled pull consumes nothing, so it can be retried.
    pub async fn next_sample_with(&mut self, cancel: &CancellationToken) -> StreamResult<Sample> {
        if self.disposed {
            return Err(StreamError::Disposed);
        }
        let processor = self.processor.as_mut().ok_or(StreamError::Disconnected)?;
        self.state.send_replace(SessionState::Reading);

        match processor.next_sample(cancel).await {
            Err(e) if e.is_disconnection() => {
                log::warn!("[Session] {}, reconnecting to {}", e, self.url);
                self.reconnect_with(cancel).await?;
                self.state.send_replace(SessionState::Reading);
                let processor = self.processor.as_mut().ok_or(StreamError::Disconnected)?;
                let retry = processor.next_sample(cancel).await;
                if let Err(e) = &retry {
                    log::error!("[Session] Pull failed again after reconnect: {}", e);
                    if e.is_disconnection() {
                        self.teardown().await;
                    }
                }
                retry
            }
            result => result,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Drops the current connection and negotiates a new one.
    ///
    /// Audio properties are kept; the presentation clock continues.
    pub async fn reconnect(&mut self) -> StreamResult<()> {
        if self.disposed {
            return Err(StreamError::Disposed);
        }
        let cancel = self.cancel.clone();
        self.reconnect_with(&cancel).await
    }

    async fn reconnect_with(&mut self, cancel: &CancellationToken) -> StreamResult<()> {
        self.state.send_replace(SessionState::Reconnecting);
        self.teardown().await;
        self.state.send_replace(SessionState::Connecting);

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(StreamError::Cancelled),
            result = negotiate(&self.url, &self.settings) => result,
        };
        let negotiated = match result {
            Ok(negotiated) => negotiated,
            Err(e) => {
                log::error!("[Session] Reconnect to {} failed: {}", self.url, e);
                self.state.send_replace(SessionState::Disconnected);
                return Err(StreamError::ReconnectFailed(Box::new(e)));
            }
        };

        if negotiated.format != self.audio.format {
            log::error!(
                "[Session] Format changed from {} to {} across reconnect",
                self.audio.format,
                negotiated.format
            );
            self.state.send_replace(SessionState::Disconnected);
            return Err(StreamError::ReconnectFailed(Box::new(
                ConnectError::UnsupportedContentType(negotiated.format.to_string()),
            )));
        }

        self.processor = Some(
            StreamProcessor::new(
                negotiated.transport,
                negotiated.format,
                negotiated.metadata_interval,
                Arc::clone(&self.emitter),
                self.settings.read_timeout(),
            )
            .with_clock(self.clock),
        );
        self.metadata_interval = negotiated.metadata_interval;
        self.resolved_url = negotiated.url;

        if negotiated.station != self.station {
            log::info!("[Session] Station changed to {:?}", negotiated.station.name);
            self.station = negotiated.station;
            self.emitter.emit(StreamEvent::StationInfoChanged {
                station: self.station.clone(),
                audio: self.audio,
                timestamp: now_millis(),
            });
        }

        log::info!("[Session] Reconnected to {}", self.resolved_url);
        self.emitter.emit(StreamEvent::Reconnected {
            timestamp: now_millis(),
        });
        self.state.send_replace(SessionState::Connected);
        Ok(())
    }

    /// Closes the current processor, keeping its clock.
    async fn teardown(&mut self) {
        if let Some(mut processor) = self.processor.take() {
            self.clock = processor.clock();
            processor.shutdown().await;
        }
        self.state.send_replace(SessionState::Disconnected);
    }

    /// Closes the connection and disposes the session.
    ///
    /// Safe to call more than once. Afterwards, pulls and reconnects fail
    /// with [`StreamError::Disposed`] and no further events are emitted.
    pub async fn disconnect(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.cancel.cancel();
        self.teardown().await;
        self.emitter = Arc::new(NoopEventEmitter);
        log::info!("[Session] Disconnected from {}", self.url);
    }
}
