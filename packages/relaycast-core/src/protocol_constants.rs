//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external conventions (ICY/SHOUTcast, Icecast,
//! MPEG audio, HTTP) and changing them would break interoperability.

// ─────────────────────────────────────────────────────────────────────────────
// ICY Protocol (Shoutcast/Icecast metadata)
// ─────────────────────────────────────────────────────────────────────────────

/// Multiplier applied to the metadata length byte.
///
/// The byte preceding each in-band metadata block counts 16-byte units.
pub const ICY_METADATA_BLOCK_UNIT: usize = 16;

/// Artist substituted when a `StreamTitle` carries no `" - "` separator.
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// Separator between artist and title inside `StreamTitle`.
pub const STREAM_TITLE_SEPARATOR: &str = " - ";

/// Default `User-Agent` sent to stream servers.
pub const DEFAULT_USER_AGENT: &str = "Shoutcast Player (http://github.com/Amrykid/UWPShoutcastMSS)";

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Terminator of the response head.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Upper bound on the response head size (bytes).
///
/// A server that never sends the blank line is treated as malformed once
/// this many bytes have been read.
pub const MAX_RESPONSE_HEAD_SIZE: usize = 16 * 1024;

/// Maximum number of redirect hops followed before giving up.
pub const MAX_REDIRECTS: u8 = 5;

/// Default HTTP port; omitted from the `Host` header.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Maximum length of a chunk-size line in chunked transfer encoding.
pub const MAX_CHUNK_LINE_LEN: usize = 1024;

/// Largest chunk size accepted in chunked transfer encoding (16 MiB).
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Audio Framing
// ─────────────────────────────────────────────────────────────────────────────

/// Nominal number of bytes read per MP3 sample.
pub const MP3_SAMPLE_SIZE: usize = 1152;

/// Nominal number of bytes read per AAC-ADTS sample.
pub const ADTS_SAMPLE_SIZE: usize = 1024;

/// Fixed presentation duration of every sample (milliseconds).
///
/// Applies to both formats and to partial frames alike.
pub const SAMPLE_DURATION_MS: u64 = 70;

/// MP3 frame header length (bytes).
pub const MP3_HEADER_LEN: usize = 4;

/// ADTS frame header length without CRC (bytes).
pub const ADTS_HEADER_LEN: usize = 7;

/// ADTS frame header length with CRC (bytes).
pub const ADTS_HEADER_LEN_CRC: usize = 9;

/// Highest MP3 bit rate accepted before a header is considered false sync (kbps).
pub const MP3_MAX_BITRATE_KBPS: u32 = 320;

/// Bytes scanned for two agreeing frame headers before detection fails.
pub const SNIFF_WINDOW: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Connection Health
// ─────────────────────────────────────────────────────────────────────────────

/// Default initial buffering threshold: 10 nominal frames of the larger format.
pub const DEFAULT_BUFFERING_THRESHOLD: usize = 10 * MP3_SAMPLE_SIZE;

/// Window without successful reads after which a session is reported unhealthy (seconds).
pub const LIVENESS_WINDOW_SECS: u64 = 300;
