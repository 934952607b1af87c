//! Relaycast Core - client-side SHOUTcast/Icecast streaming engine.
//!
//! This crate connects to an internet radio station, negotiates the ICY
//! handshake and turns the response body into a sequence of timestamped
//! compressed-audio samples plus now-playing notifications. Decoding and
//! playback are left to the consumer.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`parsers`]: MP3 and AAC-ADTS frame header decoding
//! - [`audio`]: Audio and station descriptions plus per-format framing providers
//! - [`transport`]: Identity and chunked byte transports with initial buffering
//! - [`http`]: Request building, response parsing and redirect handling
//! - [`metadata`]: In-band ICY metadata block decoding
//! - [`processor`]: Metadata demuxing, frame-sized reads and the sample clock
//! - [`session`]: Public session object with transparent reconnect
//! - [`events`]: Typed session events and their emitters
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`TransportReader`](transport::TransportReader): Buffered reads over a connection
//! - [`AudioProvider`](audio::AudioProvider): Format-specific framing
//! - [`EventEmitter`](events::EventEmitter): Delivering session events

#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod metadata;
pub mod parsers;
pub mod processor;
pub mod protocol_constants;
pub mod session;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod test_fixtures;

// Re-export commonly used types at the crate root
pub use audio::{AudioFormat, AudioInfo, Sample, ServerType, StationInfo};
pub use config::{ConnectionSettings, InitialBuffering};
pub use error::{
    ConnectError, ConnectResult, ErrorCode, MetadataParseError, StreamError, StreamResult,
    TransportError,
};
pub use events::{
    ChannelEventEmitter, EventEmitter, LoggingEventEmitter, NoopEventEmitter, StreamEvent,
};
pub use metadata::TrackMetadata;
pub use protocol_constants::DEFAULT_USER_AGENT;
pub use session::{SessionState, StreamSession};
pub use utils::now_millis;
