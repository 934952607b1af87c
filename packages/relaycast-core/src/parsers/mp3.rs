//! MPEG-1/2/2.5 audio frame header decoding (ISO/IEC 11172-3, 13818-3).

use super::FrameInfo;
use crate::protocol_constants::{MP3_HEADER_LEN, MP3_MAX_BITRATE_KBPS};

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
}

/// MPEG audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    I,
    II,
    III,
}

/// Decoded MP3 frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Header {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub bit_rate_kbps: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub padding: bool,
}

// Bit rates (kbps) for indexes 1..=14. Index 0 (free format) and 15 are invalid.
const V1_L1: [u32; 14] = [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const V1_L2: [u32; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const V1_L3: [u32; 14] = [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const V2_L1: [u32; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const V2_L23: [u32; 14] = [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_V2_5: [u32; 3] = [11025, 12000, 8000];

/// Returns true if `b0`,`b1` form an MP3 frame sync.
///
/// `0xFF 0xFF` is excluded: it decodes to MPEG-1 Layer I and shows up
/// constantly in padding and silence.
#[inline]
#[must_use]
pub fn is_frame_sync(b0: u8, b1: u8) -> bool {
    b0 == 0xFF && (b1 & 0xE0) == 0xE0 && b1 != 0xFF
}

/// Returns true if `header` decodes to a usable frame.
#[must_use]
pub fn is_valid_header(header: &[u8]) -> bool {
    parse_header(header).is_some()
}

/// Decodes a 4-byte MP3 frame header.
///
/// Returns `None` for short input, missing sync, reserved version/layer,
/// free-format or bad bit-rate indexes, reserved sample rates, dual-channel
/// mode and bit rates above 320 kbps.
#[must_use]
pub fn parse_header(header: &[u8]) -> Option<Mp3Header> {
    if header.len() < MP3_HEADER_LEN || !is_frame_sync(header[0], header[1]) {
        return None;
    }
    let (b1, b2, b3) = (header[1], header[2], header[3]);

    let version = match (b1 >> 3) & 0x03 {
        3 => MpegVersion::V1,
        2 => MpegVersion::V2,
        0 => MpegVersion::V2_5,
        _ => return None,
    };
    let layer = match (b1 >> 1) & 0x03 {
        1 => MpegLayer::III,
        2 => MpegLayer::II,
        3 => MpegLayer::I,
        _ => return None,
    };

    let bit_rate_index = (b2 >> 4) as usize;
    if bit_rate_index == 0 || bit_rate_index == 15 {
        return None;
    }
    let table = match (version, layer) {
        (MpegVersion::V1, MpegLayer::I) => &V1_L1,
        (MpegVersion::V1, MpegLayer::II) => &V1_L2,
        (MpegVersion::V1, MpegLayer::III) => &V1_L3,
        (_, MpegLayer::I) => &V2_L1,
        (_, _) => &V2_L23,
    };
    let bit_rate_kbps = table[bit_rate_index - 1];
    if bit_rate_kbps > MP3_MAX_BITRATE_KBPS {
        return None;
    }

    let sample_rate_index = ((b2 >> 2) & 0x03) as usize;
    let rates = match version {
        MpegVersion::V1 => &SAMPLE_RATES_V1,
        MpegVersion::V2 => &SAMPLE_RATES_V2,
        MpegVersion::V2_5 => &SAMPLE_RATES_V2_5,
    };
    let sample_rate = *rates.get(sample_rate_index)?;

    let channels = match b3 >> 6 {
        0 | 1 => 2, // stereo, joint stereo
        3 => 1,     // mono
        _ => return None,
    };

    Some(Mp3Header {
        version,
        layer,
        bit_rate_kbps,
        sample_rate,
        channels,
        padding: (b2 >> 1) & 0x01 == 1,
    })
}

impl Mp3Header {
    /// Frame length in bytes, header included.
    #[must_use]
    pub fn frame_length(&self) -> usize {
        let bit_rate = self.bit_rate_kbps as usize * 1000;
        let sample_rate = self.sample_rate as usize;
        let padding = usize::from(self.padding);
        match (self.layer, self.version) {
            (MpegLayer::I, _) => (12 * bit_rate / sample_rate + padding) * 4,
            (MpegLayer::III, MpegVersion::V2 | MpegVersion::V2_5) => {
                72 * bit_rate / sample_rate + padding
            }
            _ => 144 * bit_rate / sample_rate + padding,
        }
    }

    /// Converts to the format-neutral [`FrameInfo`].
    #[must_use]
    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_rate_kbps: Some(self.bit_rate_kbps),
            frame_length: self.frame_length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mpeg1_layer3_128k() {
        let h = parse_header(&[0xFF, 0xFB, 0x90, 0x64]).unwrap();
        assert_eq!(h.version, MpegVersion::V1);
        assert_eq!(h.layer, MpegLayer::III);
        assert_eq!(h.bit_rate_kbps, 128);
        assert_eq!(h.sample_rate, 44100);
        assert_eq!(h.channels, 2);
        assert_eq!(h.frame_length(), 417);
    }

    #[test]
    fn decodes_mono_and_padding() {
        // 0x92: bit rate index 9, sample rate index 0, padding set; 0xC4: mono
        let h = parse_header(&[0xFF, 0xFB, 0x92, 0xC4]).unwrap();
        assert_eq!(h.channels, 1);
        assert!(h.padding);
        assert_eq!(h.frame_length(), 418);
    }

    #[test]
    fn decodes_mpeg2_and_mpeg25_rates() {
        // MPEG-2 Layer III, 64 kbps, 22050 Hz
        let h = parse_header(&[0xFF, 0xF3, 0x80, 0x00]).unwrap();
        assert_eq!(h.version, MpegVersion::V2);
        assert_eq!(h.bit_rate_kbps, 64);
        assert_eq!(h.sample_rate, 22050);
        assert_eq!(h.frame_length(), 72 * 64_000 / 22050);

        // MPEG-2.5 Layer III, 8 kbps, 8000 Hz
        let h = parse_header(&[0xFF, 0xE3, 0x18, 0x00]).unwrap();
        assert_eq!(h.version, MpegVersion::V2_5);
        assert_eq!(h.bit_rate_kbps, 8);
        assert_eq!(h.sample_rate, 8000);
    }

    #[test]
    fn rejects_low_second_byte() {
        for b1 in 0x00..=0xE0u8 {
            assert!(!is_valid_header(&[0xFF, b1, 0x90, 0x64]), "b1={b1:#04x}");
        }
    }

    #[test]
    fn rejects_reserved_fields() {
        // reserved version
        assert!(!is_valid_header(&[0xFF, 0xEB, 0x90, 0x64]));
        // reserved layer
        assert!(!is_valid_header(&[0xFF, 0xF9, 0x90, 0x64]));
        // free format and bad bit-rate indexes
        assert!(!is_valid_header(&[0xFF, 0xFB, 0x00, 0x64]));
        assert!(!is_valid_header(&[0xFF, 0xFB, 0xF0, 0x64]));
        // reserved sample rate
        assert!(!is_valid_header(&[0xFF, 0xFB, 0x9C, 0x64]));
        // dual channel
        assert!(!is_valid_header(&[0xFF, 0xFB, 0x90, 0x84]));
        // 0xFF 0xFF is never sync
        assert!(!is_valid_header(&[0xFF, 0xFF, 0x90, 0x64]));
        // short input
        assert!(!is_valid_header(&[0xFF, 0xFB, 0x90]));
    }

    #[test]
    fn every_accepted_bit_rate_is_in_range() {
        for b1 in 0xE1..=0xFEu8 {
            for b2 in 0..=0xFFu8 {
                if let Some(h) = parse_header(&[0xFF, b1, b2, 0x00]) {
                    assert!((8..=MP3_MAX_BITRATE_KBPS).contains(&h.bit_rate_kbps));
                }
            }
        }
    }

    #[test]
    fn mpeg1_layer1_high_rates_are_rejected() {
        // MPEG-1 Layer I index 11 = 352 kbps
        assert!(!is_valid_header(&[0xFF, 0xFE, 0xB0, 0x00]));
    }
}
