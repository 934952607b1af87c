//! AAC Audio Data Transport Stream (ADTS) frame header decoding.
//!
//! ADTS headers carry no usable bit rate; it must come from the server.

use super::FrameInfo;
use crate::protocol_constants::{ADTS_HEADER_LEN, ADTS_HEADER_LEN_CRC};

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Decoded ADTS frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// MPEG-4 audio object type (profile + 1).
    pub object_type: u8,
    /// Sample rate in Hz, doubled for object types 2 and 5.
    pub sample_rate: u32,
    pub channels: u8,
    /// Frame length including the header.
    pub frame_length: usize,
    pub protection_absent: bool,
}

/// Returns true if `b0`,`b1` form an ADTS sync word.
#[inline]
#[must_use]
pub fn is_frame_sync(b0: u8, b1: u8) -> bool {
    b0 == 0xFF && (b1 & 0xF0) == 0xF0
}

/// Returns true if `header` decodes to a usable frame.
#[must_use]
pub fn is_valid_header(header: &[u8]) -> bool {
    parse_header(header).is_some()
}

/// Decodes a 7-byte ADTS header.
///
/// Returns `None` for short input, missing sync, a non-zero layer field,
/// reserved sampling-frequency indexes and frame lengths shorter than the
/// header itself.
#[must_use]
pub fn parse_header(header: &[u8]) -> Option<AdtsHeader> {
    if header.len() < ADTS_HEADER_LEN || !is_frame_sync(header[0], header[1]) {
        return None;
    }
    let (b1, b2, b3, b4, b5) = (header[1], header[2], header[3], header[4], header[5]);

    if (b1 >> 1) & 0x03 != 0 {
        return None;
    }
    let protection_absent = b1 & 0x01 == 1;

    let object_type = (b2 >> 6) + 1;
    let frequency_index = ((b2 >> 2) & 0x0F) as usize;
    let base_rate = *SAMPLE_RATES.get(frequency_index)?;
    // SBR doubling
    let sample_rate = if object_type == 2 || object_type == 5 {
        base_rate * 2
    } else {
        base_rate
    };

    let channels = match ((b2 & 0x01) << 2) | (b3 >> 6) {
        7 => 8,
        c => c,
    };

    let frame_length =
        (usize::from(b3 & 0x03) << 11) | (usize::from(b4) << 3) | usize::from(b5 >> 5);
    let header_len = if protection_absent {
        ADTS_HEADER_LEN
    } else {
        ADTS_HEADER_LEN_CRC
    };
    if frame_length < header_len {
        return None;
    }

    Some(AdtsHeader {
        object_type,
        sample_rate,
        channels,
        frame_length,
        protection_absent,
    })
}

impl AdtsHeader {
    /// Header length in bytes (9 when a CRC follows).
    #[must_use]
    pub fn header_length(&self) -> usize {
        if self.protection_absent {
            ADTS_HEADER_LEN
        } else {
            ADTS_HEADER_LEN_CRC
        }
    }

    /// Converts to the format-neutral [`FrameInfo`].
    #[must_use]
    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_rate_kbps: None,
            frame_length: self.frame_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::adts_header;

    #[test]
    fn decodes_lc_stereo() {
        let h = parse_header(&adts_header(1, 4, 2, 371)).unwrap();
        assert_eq!(h.object_type, 2);
        assert_eq!(h.sample_rate, 88200);
        assert_eq!(h.channels, 2);
        assert_eq!(h.frame_length, 371);
        assert!(h.protection_absent);
        assert_eq!(h.header_length(), 7);
    }

    #[test]
    fn sbr_object_types_double_the_table_rate() {
        for index in 0..SAMPLE_RATES.len() as u8 {
            // object type 5 cannot be signalled in an ADTS profile field
            let h = parse_header(&adts_header(1, index, 2, 200)).unwrap();
            assert_eq!(h.sample_rate, 2 * SAMPLE_RATES[index as usize]);
        }
    }

    #[test]
    fn other_object_types_use_table_rate() {
        // Main, SSR and LTP profiles
        for profile in [0u8, 2, 3] {
            let h = parse_header(&adts_header(profile, 3, 2, 200)).unwrap();
            assert_eq!(h.sample_rate, 48000);
        }
    }

    #[test]
    fn channel_config_seven_means_eight() {
        let h = parse_header(&adts_header(1, 4, 7, 200)).unwrap();
        assert_eq!(h.channels, 8);
        for config in 0..=6u8 {
            let h = parse_header(&adts_header(1, 4, config, 200)).unwrap();
            assert_eq!(h.channels, config);
        }
    }

    #[test]
    fn crc_extends_header() {
        let mut header = adts_header(1, 4, 2, 200);
        header[1] &= 0xFE;
        let h = parse_header(&header).unwrap();
        assert!(!h.protection_absent);
        assert_eq!(h.header_length(), 9);
    }

    #[test]
    fn rejects_invalid_headers() {
        // reserved frequency index
        assert!(!is_valid_header(&adts_header(1, 13, 2, 200)));
        // frame shorter than its header
        assert!(!is_valid_header(&adts_header(1, 4, 2, 5)));
        // layer bits set
        let mut header = adts_header(1, 4, 2, 200);
        header[1] |= 0x02;
        assert!(!is_valid_header(&header));
        // no sync
        assert!(!is_valid_header(&[0xFF, 0xE1, 0x50, 0x80, 0x2E, 0x7F, 0xFC]));
        assert!(!is_valid_header(&[0xFF, 0xF1, 0x50]));
    }
}
