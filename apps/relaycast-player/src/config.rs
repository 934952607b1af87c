//! Player configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use relaycast_core::ConnectionSettings;
use serde::Deserialize;

/// Player configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Station URL.
    /// Override: `RELAYCAST_URL`
    pub url: Option<String>,

    /// Where to write the demuxed audio; `-` means stdout.
    /// If not specified, samples are pulled and discarded.
    pub output: Option<PathBuf>,

    /// Pull samples at real-time cadence instead of as fast as possible.
    pub pace: bool,

    /// Seconds between liveness checks.
    pub poll_interval_secs: u64,

    /// Connection settings passed to the engine.
    /// Overrides: `RELAYCAST_USER_AGENT`, `RELAYCAST_RELATIVE_PATH`,
    /// `RELAYCAST_REQUEST_METADATA`
    pub connection: ConnectionSettings,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            url: None,
            output: None,
            pace: true,
            poll_interval_secs: 30,
            connection: ConnectionSettings::default(),
        }
    }
}

impl PlayerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RELAYCAST_URL") {
            self.url = Some(val);
        }

        if let Ok(val) = std::env::var("RELAYCAST_USER_AGENT") {
            self.connection.user_agent = val;
        }

        if let Ok(val) = std::env::var("RELAYCAST_RELATIVE_PATH") {
            self.connection.relative_path = val;
        }

        if let Ok(val) = std::env::var("RELAYCAST_REQUEST_METADATA") {
            if let Ok(enabled) = val.parse() {
                self.connection.request_metadata = enabled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_core::InitialBuffering;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PlayerConfig::from_yaml("{}").unwrap();
        assert!(config.url.is_none());
        assert!(config.pace);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.connection, ConnectionSettings::default());
    }

    #[test]
    fn parses_nested_connection_settings() {
        let yaml = r#"
url: "http://radio.example:8000/live"
output: "-"
pace: false
connection:
  user_agent: "Relaycast/0.1"
  relative_path: ";"
  request_metadata: false
  initial_buffering:
    mode: delay
    ms: 1500
"#;
        let config = PlayerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.url.as_deref(), Some("http://radio.example:8000/live"));
        assert_eq!(config.output, Some(PathBuf::from("-")));
        assert!(!config.pace);
        assert_eq!(config.connection.user_agent, "Relaycast/0.1");
        assert_eq!(config.connection.relative_path, ";");
        assert!(!config.connection.request_metadata);
        assert_eq!(
            config.connection.initial_buffering,
            InitialBuffering::Delay { ms: 1500 }
        );
        assert_eq!(config.connection.max_redirects, 5);
    }

    #[test]
    fn rejects_unknown_buffering_mode() {
        let yaml = "connection:\n  initial_buffering:\n    mode: forever\n";
        assert!(PlayerConfig::from_yaml(yaml).is_err());
    }
}
