//! Centralized error types for the relaycast core library.
//!
//! Each layer of the engine owns one error enum:
//! - [`ConnectError`]: handshake and negotiation failures (fatal to a connect attempt)
//! - [`TransportError`]: socket and chunk-framing failures below the processor
//! - [`StreamError`]: sample production failures surfaced to the consumer
//! - [`MetadataParseError`]: malformed in-band metadata (best-effort, never fatal)
//!
//! All of them implement [`ErrorCode`] so callers can branch on stable strings.

use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

/// Errors raised while establishing a stream connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The URL could not be parsed or has no usable host.
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    /// Connection settings failed validation.
    #[error("Invalid connection settings: {0}")]
    InvalidSettings(String),

    /// DNS resolution, TCP connect or the handshake timed out or was refused.
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// Socket I/O failed after the connection was established.
    #[error("I/O error during handshake: {0}")]
    Io(#[from] std::io::Error),

    /// The response head could not be parsed.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Server answered 400 or 404.
    #[error("Station unavailable (HTTP {0})")]
    StationUnavailable(u16),

    /// Server answered 503.
    #[error("Listener limit reached")]
    ListenerLimitReached,

    /// Any other non-success status.
    #[error("Unexpected status {code}: {reason}")]
    UnexpectedStatus {
        /// Numeric status code.
        code: u16,
        /// Reason phrase as sent by the server.
        reason: String,
    },

    /// Too many redirects were followed.
    #[error("Redirect loop: gave up after {0} redirects")]
    RedirectLoop(u8),

    /// A mandatory response header is absent.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// A header value could not be interpreted.
    #[error("Invalid header {name}: {value:?}")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
        /// Raw value received.
        value: String,
    },

    /// Content-Type is not an audio format the engine can frame.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// ADTS streams need a server-declared bit rate and none was sent.
    #[error("Unknown bit rate: server did not declare one")]
    UnknownBitRate,

    /// Audio properties could not be detected from the bitstream.
    #[error("Audio detection failed: {0}")]
    Detection(#[from] StreamError),
}

/// Errors raised by a transport reader.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("Connection closed by server")]
    Disconnected,

    /// Underlying socket error.
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk-size line could not be parsed.
    #[error("Invalid chunk framing: {0}")]
    InvalidChunk(String),
}

/// Errors raised while producing samples.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream ended or a read came back short.
    #[error("Stream disconnected")]
    Disconnected,

    /// The pull was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// No bytes arrived within the read timeout.
    #[error("Read timed out")]
    Timeout,

    /// Frame sync was never found or parsed values were invalid.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The session was disconnected by the caller.
    #[error("Session has been disposed")]
    Disposed,

    /// Recovery after a disconnection failed.
    #[error("Reconnect failed: {0}")]
    ReconnectFailed(Box<ConnectError>),

    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl StreamError {
    /// Returns true if a fresh connection may recover from this error.
    #[must_use]
    pub fn is_disconnection(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Timeout | Self::Transport(_))
    }
}

/// Errors raised while decoding an in-band metadata block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataParseError {
    /// The block contained no text.
    #[error("Metadata block is empty")]
    Empty,

    /// No `StreamTitle` key was present.
    #[error("Metadata block has no StreamTitle: {0:?}")]
    MissingStreamTitle(String),
}

impl ErrorCode for ConnectError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::InvalidSettings(_) => "invalid_settings",
            Self::Unreachable(_) => "unreachable",
            Self::Io(_) => "io_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::StationUnavailable(_) => "station_unavailable",
            Self::ListenerLimitReached => "listener_limit_reached",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::RedirectLoop(_) => "redirect_loop",
            Self::MissingHeader(_) => "missing_header",
            Self::InvalidHeader { .. } => "invalid_header",
            Self::UnsupportedContentType(_) => "unsupported_content_type",
            Self::UnknownBitRate => "unknown_bit_rate",
            Self::Detection(_) => "detection_failed",
        }
    }
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Io(_) => "io_error",
            Self::InvalidChunk(_) => "invalid_chunk",
        }
    }
}

impl ErrorCode for StreamError {
    fn code(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Decode(_) => "decode_error",
            Self::Disposed => "disposed",
            Self::ReconnectFailed(_) => "reconnect_failed",
            Self::Transport(e) => e.code(),
        }
    }
}

impl ErrorCode for MetadataParseError {
    fn code(&self) -> &'static str {
        match self {
            Self::Empty => "metadata_empty",
            Self::MissingStreamTitle(_) => "metadata_missing_stream_title",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a connection attempt.
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Result of a transport operation.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result of a sample pull.
pub type StreamResult<T> = Result<T, StreamError>;
