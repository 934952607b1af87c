//! Audio and station descriptions plus the per-format sample providers.

mod provider;

pub use provider::{provider_for, AdtsProvider, AudioProvider, Mp3Provider};

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

/// Compressed audio format carried by the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioFormat {
    /// MPEG audio (`audio/mpeg`).
    Mp3,
    /// AAC (`audio/aac`), framed as ADTS on the wire.
    Aac,
    /// AAC+ in ADTS framing (`audio/aacp`).
    AacAdts,
}

impl AudioFormat {
    /// Maps a `Content-Type` value to a format.
    ///
    /// Parameters such as `; charset=` are ignored and matching is case-insensitive.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        if mime.eq_ignore_ascii_case("audio/mpeg") {
            Some(Self::Mp3)
        } else if mime.eq_ignore_ascii_case("audio/aac") {
            Some(Self::Aac)
        } else if mime.eq_ignore_ascii_case("audio/aacp") {
            Some(Self::AacAdts)
        } else {
            None
        }
    }

    /// Returns true for the AAC family, whose headers carry no bit rate.
    #[must_use]
    pub fn is_aac(self) -> bool {
        matches!(self, Self::Aac | Self::AacAdts)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mp3 => write!(f, "MP3"),
            Self::Aac => write!(f, "AAC"),
            Self::AacAdts => write!(f, "AAC-ADTS"),
        }
    }
}

/// Properties of the audio bitstream.
///
/// Populated from `ice-audio-info` when the server sends it, otherwise
/// detected from the first frames. The format never changes within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u8,
    /// Bit rate in kbps.
    pub bit_rate: u32,
}

/// Server software family, inferred from response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerType {
    #[default]
    Shoutcast,
    Icecast,
}

/// Station description from `icy-*` response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationInfo {
    pub name: String,
    pub genre: String,
    pub description: String,
    pub server_type: ServerType,
}

/// One pulled audio frame.
///
/// Ownership transfers to the caller; samples are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Raw compressed bytes.
    pub data: Bytes,
    /// Presentation timestamp from the session clock.
    pub timestamp: Duration,
    /// Fixed per-sample duration.
    pub duration: Duration,
    /// True when the frame was cut short by a metadata boundary.
    pub partial: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_content_types() {
        assert_eq!(AudioFormat::from_content_type("audio/mpeg"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_content_type(" Audio/AAC "), Some(AudioFormat::Aac));
        assert_eq!(
            AudioFormat::from_content_type("audio/aacp; charset=binary"),
            Some(AudioFormat::AacAdts)
        );
        assert_eq!(AudioFormat::from_content_type("audio/ogg"), None);
        assert_eq!(AudioFormat::from_content_type(""), None);
    }

    #[test]
    fn station_info_serializes_camel_case() {
        let info = StationInfo {
            name: "Test".into(),
            server_type: ServerType::Icecast,
            ..Default::default()
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "Test");
        assert_eq!(json["serverType"], "icecast");
    }
}
