//! Per-connection settings.
//!
//! Settings are immutable input to a connection attempt and are retained by
//! the session so a reconnect replays the identical request.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_BUFFERING_THRESHOLD, DEFAULT_USER_AGENT, LIVENESS_WINDOW_SECS, MAX_REDIRECTS,
};

/// Strategy for withholding data until enough has accumulated at stream start.
///
/// Only applies to chunked transfers, where a background task fills the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum InitialBuffering {
    /// Open the gate once this many payload bytes have been reassembled.
    Threshold {
        /// Byte count required before reads proceed.
        bytes: usize,
    },
    /// Open the gate after a fixed delay.
    Delay {
        /// Delay in milliseconds.
        ms: u64,
    },
    /// Never withhold data.
    Disabled,
}

impl Default for InitialBuffering {
    fn default() -> Self {
        Self::Threshold {
            bytes: DEFAULT_BUFFERING_THRESHOLD,
        }
    }
}

/// Settings for a single stream connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// `User-Agent` header value.
    pub user_agent: String,

    /// Suffix appended to the URL path (e.g. `";"` for legacy SHOUTcast servers).
    pub relative_path: String,

    /// Whether to ask for in-band ICY metadata.
    pub request_metadata: bool,

    /// TCP connect timeout (milliseconds).
    pub connect_timeout_ms: u64,

    /// Maximum wait for data on any single read (milliseconds).
    pub read_timeout_ms: u64,

    /// Redirect hops followed before failing with a redirect loop.
    pub max_redirects: u8,

    /// Initial buffering gate for chunked transfers.
    pub initial_buffering: InitialBuffering,

    /// Window without successful reads after which the session is unhealthy (seconds).
    pub liveness_window_secs: u64,
}

impl ConnectionSettings {
    /// Validates the settings.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_agent.trim().is_empty() {
            return Err("user_agent must not be empty".to_string());
        }
        if self.user_agent.contains(['\r', '\n']) || self.relative_path.contains(['\r', '\n']) {
            return Err("user_agent and relative_path must not contain line breaks".to_string());
        }
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be >= 1".to_string());
        }
        if self.read_timeout_ms == 0 {
            return Err("read_timeout_ms must be >= 1".to_string());
        }
        if self.liveness_window_secs == 0 {
            return Err("liveness_window_secs must be >= 1".to_string());
        }
        if let InitialBuffering::Threshold { bytes: 0 } = self.initial_buffering {
            return Err("initial_buffering threshold must be >= 1 (use disabled instead)".to_string());
        }
        Ok(())
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout as a [`Duration`].
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Liveness window as a [`Duration`].
    #[must_use]
    pub fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            relative_path: String::new(),
            request_metadata: true,
            connect_timeout_ms: 10_000,
            read_timeout_ms: 30_000,
            max_redirects: MAX_REDIRECTS,
            initial_buffering: InitialBuffering::default(),
            liveness_window_secs: LIVENESS_WINDOW_SECS,
        }
    }
}
