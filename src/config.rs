//! Reader configuration.
//!
//! Every field has a default matching the simulator SDK, so most callers use
//! [`ReaderConfig::default()`]. Overlays that need different names or timing
//! can load the same structure from TOML:
//!
//! ```toml
//! memmap_name = "Local\\IRSDKMemMapFileName"
//! event_name = "Local\\IRSDKDataValidEvent"
//! wait_timeout_ms = 16
//! max_copy_attempts = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Name of the shared memory mapping published by the simulator.
pub const IRSDK_MEMMAPFILENAME: &str = "Local\\IRSDKMemMapFileName";
/// Name of the event the simulator signals when a new row is published.
pub const IRSDK_DATAVALIDEVENTNAME: &str = "Local\\IRSDKDataValidEvent";
/// Header version this crate understands.
pub const IRSDK_VER: i32 = 2;
/// Default event wait in milliseconds.
pub const IRSDK_TIMEOUT_MS: u64 = 30;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Configuration file not readable: {0}")]
    Io(String),

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Settings for attaching to and polling the telemetry feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Shared memory mapping name.
    pub memmap_name: String,
    /// Data-valid event name.
    pub event_name: String,
    /// Event wait in milliseconds used by
    /// [`Connection::wait_for_data_default`](crate::Connection::wait_for_data_default).
    pub wait_timeout_ms: u64,
    /// Copy attempts per poll before a torn slot is abandoned.
    pub max_copy_attempts: u32,
    /// Header version required at attach time; `None` accepts any version.
    pub expected_version: Option<i32>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            memmap_name: IRSDK_MEMMAPFILENAME.to_string(),
            event_name: IRSDK_DATAVALIDEVENTNAME.to_string(),
            wait_timeout_ms: IRSDK_TIMEOUT_MS,
            max_copy_attempts: 2,
            expected_version: Some(IRSDK_VER),
        }
    }
}

impl ReaderConfig {
    /// Parse and validate a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memmap_name.is_empty() {
            return Err(ConfigError::Validation("memmap_name cannot be empty".to_string()));
        }
        if self.event_name.is_empty() {
            return Err(ConfigError::Validation("event_name cannot be empty".to_string()));
        }
        if self.max_copy_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_copy_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The default event wait as a [`Duration`].
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sdk_constants() {
        let config = ReaderConfig::default();
        assert_eq!(config.memmap_name, "Local\\IRSDKMemMapFileName");
        assert_eq!(config.event_name, "Local\\IRSDKDataValidEvent");
        assert_eq!(config.wait_timeout(), Duration::from_millis(30));
        assert_eq!(config.max_copy_attempts, 2);
        assert_eq!(config.expected_version, Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ReaderConfig::from_toml_str("max_copy_attempts = 4\nwait_timeout_ms = 16\n")
            .expect("valid config");
        assert_eq!(config.max_copy_attempts, 4);
        assert_eq!(config.wait_timeout_ms, 16);
        assert_eq!(config.memmap_name, IRSDK_MEMMAPFILENAME);
    }

    #[test]
    fn zero_copy_attempts_rejected() {
        let result = ReaderConfig::from_toml_str("max_copy_attempts = 0");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn malformed_toml_rejected() {
        let result = ReaderConfig::from_toml_str("max_copy_attempts = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = ReaderConfig::load(Path::new("/nonexistent/irsdk-poll.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
