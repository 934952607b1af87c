//! In-band ICY metadata decoding.
//!
//! A block is ASCII text of the form `KEY='value';KEY2='value2';`, NUL-padded
//! to a multiple of 16 bytes. Only `StreamTitle` is interpreted.

use serde::Serialize;

use crate::error::MetadataParseError;
use crate::protocol_constants::{STREAM_TITLE_SEPARATOR, UNKNOWN_ARTIST};

/// Now-playing information extracted from `StreamTitle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
}

/// Splits a metadata block into `(KEY, value)` pairs.
///
/// Keys are uppercased. Quoted values may contain `;`; surrounding quotes
/// and whitespace are trimmed.
#[must_use]
pub fn parse_pairs(block: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = block.trim_end_matches('\0');

    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim().trim_start_matches(';').trim().to_ascii_uppercase();
        let after = &rest[eq + 1..];

        let (value, remainder) = if let Some(quoted) = after.strip_prefix('\'') {
            match quoted.find("';") {
                Some(end) => (&quoted[..end], &quoted[end + 2..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(';') {
                Some(end) => (&after[..end], &after[end + 1..]),
                None => (after, ""),
            }
        };

        if !key.is_empty() {
            let value = value.trim().trim_matches('\'').trim();
            pairs.push((key, value.to_string()));
        }
        rest = remainder;
    }
    pairs
}

/// Decodes a metadata block into artist and title.
///
/// `StreamTitle` is split at the first `" - "`; without a separator the
/// whole string is the title and the artist is `"Unknown"`.
pub fn parse_metadata(block: &str) -> Result<TrackMetadata, MetadataParseError> {
    if block.trim_matches(|c: char| c == '\0' || c.is_whitespace()).is_empty() {
        return Err(MetadataParseError::Empty);
    }

    let stream_title = parse_pairs(block)
        .into_iter()
        .find(|(key, _)| key == "STREAMTITLE")
        .map(|(_, value)| value)
        .ok_or_else(|| {
            MetadataParseError::MissingStreamTitle(block.trim_end_matches('\0').to_string())
        })?;

    let metadata = match stream_title.split_once(STREAM_TITLE_SEPARATOR) {
        Some((artist, title)) => TrackMetadata {
            title: title.trim().to_string(),
            artist: artist.trim().to_string(),
        },
        None => TrackMetadata {
            title: stream_title.trim().to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
        },
    };
    Ok(metadata)
}
