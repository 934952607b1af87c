//! Per-format framing knowledge used by the stream processor.
//!
//! The processor never branches on [`AudioFormat`] directly; it asks the
//! provider for sync detection, header decoding and nominal read sizes.

use std::time::Duration;

use bytes::Bytes;

use super::{AudioFormat, Sample};
use crate::parsers::{adts, mp3, FrameInfo};
use crate::protocol_constants::{
    ADTS_HEADER_LEN, ADTS_SAMPLE_SIZE, MP3_HEADER_LEN, MP3_SAMPLE_SIZE, SAMPLE_DURATION_MS,
};

/// Framing operations for one compressed format.
pub trait AudioProvider: Send + Sync {
    /// Bytes needed to decode a frame header.
    fn header_length(&self) -> usize;

    /// Nominal number of bytes read per sample.
    fn sample_size(&self) -> usize;

    /// Fixed presentation duration of each sample.
    fn sample_duration(&self) -> Duration {
        Duration::from_millis(SAMPLE_DURATION_MS)
    }

    /// Returns true if the two bytes start a frame header.
    fn is_frame_sync(&self, b0: u8, b1: u8) -> bool;

    /// Decodes a frame header, or `None` if it is not valid.
    fn grab_frame_info(&self, header: &[u8]) -> Option<FrameInfo>;

    /// Wraps bytes read from the stream into a timestamped sample.
    fn parse_sample(&self, data: Bytes, timestamp: Duration, partial: bool) -> Sample {
        Sample {
            data,
            timestamp,
            duration: self.sample_duration(),
            partial,
        }
    }
}

/// MPEG audio provider.
pub struct Mp3Provider;

impl AudioProvider for Mp3Provider {
    fn header_length(&self) -> usize {
        MP3_HEADER_LEN
    }

    fn sample_size(&self) -> usize {
        MP3_SAMPLE_SIZE
    }

    fn is_frame_sync(&self, b0: u8, b1: u8) -> bool {
        mp3::is_frame_sync(b0, b1)
    }

    fn grab_frame_info(&self, header: &[u8]) -> Option<FrameInfo> {
        mp3::parse_header(header).map(|h| h.frame_info())
    }
}

/// AAC-ADTS provider.
pub struct AdtsProvider;

impl AudioProvider for AdtsProvider {
    fn header_length(&self) -> usize {
        ADTS_HEADER_LEN
    }

    fn sample_size(&self) -> usize {
        ADTS_SAMPLE_SIZE
    }

    fn is_frame_sync(&self, b0: u8, b1: u8) -> bool {
        adts::is_frame_sync(b0, b1)
    }

    fn grab_frame_info(&self, header: &[u8]) -> Option<FrameInfo> {
        adts::parse_header(header).map(|h| h.frame_info())
    }
}

static MP3_PROVIDER: Mp3Provider = Mp3Provider;
static ADTS_PROVIDER: AdtsProvider = AdtsProvider;

/// Returns the provider for `format`.
///
/// Both AAC content types are framed as ADTS.
#[must_use]
pub fn provider_for(format: AudioFormat) -> &'static dyn AudioProvider {
    match format {
        AudioFormat::Mp3 => &MP3_PROVIDER,
        AudioFormat::Aac | AudioFormat::AacAdts => &ADTS_PROVIDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{adts_header, MP3_HEADER};

    #[test]
    fn factory_selects_by_format() {
        assert_eq!(provider_for(AudioFormat::Mp3).sample_size(), 1152);
        assert_eq!(provider_for(AudioFormat::Aac).sample_size(), 1024);
        assert_eq!(provider_for(AudioFormat::AacAdts).header_length(), 7);
    }

    #[test]
    fn providers_decode_their_own_headers_only() {
        let mp3 = provider_for(AudioFormat::Mp3);
        let aac = provider_for(AudioFormat::AacAdts);

        let info = mp3.grab_frame_info(&MP3_HEADER).unwrap();
        assert_eq!(info.bit_rate_kbps, Some(128));

        let header = adts_header(1, 3, 2, 300);
        let info = aac.grab_frame_info(&header).unwrap();
        assert_eq!(info.bit_rate_kbps, None);
        assert_eq!(info.frame_length, 300);

        assert!(aac.grab_frame_info(&MP3_HEADER).is_none());
    }

    #[test]
    fn samples_carry_fixed_duration() {
        let sample = provider_for(AudioFormat::Mp3).parse_sample(
            Bytes::from_static(b"abc"),
            Duration::from_millis(140),
            true,
        );
        assert_eq!(sample.duration, Duration::from_millis(70));
        assert_eq!(sample.timestamp, Duration::from_millis(140));
        assert!(sample.partial);
    }
}
