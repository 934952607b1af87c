//! Session events delivered to the consumer.
//!
//! This module provides:
//! - [`StreamEvent`], the typed notifications a session raises
//! - [`EventEmitter`] and its implementations for delivering them

mod emitter;

pub use emitter::{ChannelEventEmitter, EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::audio::{AudioInfo, StationInfo};

/// Events raised by a stream session.
///
/// Events are emitted from the pull path in byte-stream order, so a
/// metadata change is observed between the samples that straddle its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A new `StreamTitle` arrived.
    MetadataChanged {
        title: String,
        artist: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The session recovered from a disconnection.
    Reconnected {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Station or audio description was set or replaced.
    #[serde(rename_all = "camelCase")]
    StationInfoChanged {
        station: StationInfo,
        audio: AudioInfo,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    #[test]
    fn serializes_with_type_tag() {
        let event = StreamEvent::MetadataChanged {
            title: "Song".into(),
            artist: "Artist".into(),
            timestamp: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "metadataChanged");
        assert_eq!(json["title"], "Song");
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn station_info_event_nests_descriptions() {
        let event = StreamEvent::StationInfoChanged {
            station: StationInfo {
                name: "Test".into(),
                ..Default::default()
            },
            audio: AudioInfo {
                format: AudioFormat::Mp3,
                sample_rate: 44100,
                channels: 2,
                bit_rate: 128,
            },
            timestamp: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stationInfoChanged");
        assert_eq!(json["station"]["name"], "Test");
        assert_eq!(json["audio"]["sampleRate"], 44100);
        assert_eq!(json["audio"]["format"], "mp3");
    }
}
