//! Compressed-audio frame header parsers.
//!
//! Pure functions with no I/O. Malformed or reserved bit patterns yield
//! `None` so a scanner can slide one byte and look for the next sync word.

pub mod adts;
pub mod mp3;

/// Properties decoded from a single frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u8,
    /// Bit rate in kbps, when the header encodes one.
    pub bit_rate_kbps: Option<u32>,
    /// Total frame length in bytes, header included.
    pub frame_length: usize,
}

impl FrameInfo {
    /// Returns true if two consecutive frames describe the same stream.
    ///
    /// MP3 VBR streams change bit rate per frame, so only sample rate and
    /// channel count must match.
    #[must_use]
    pub fn agrees_with(&self, other: &FrameInfo) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }
}
