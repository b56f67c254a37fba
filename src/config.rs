//! Configuration for the RS-232 bridge

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::line::LineParams;
use crate::{Error, Result};

/// Environment variable that overrides [`Rs232Config::device_path`].
pub const DEVICE_ENV: &str = "RS232_DEVICE";

/// Longest idle pause accepted; bounds how long `shutdown` may wait.
const MAX_IDLE_INTERVAL: Duration = Duration::from_secs(1);

/// Settings supplied by the emulator's configuration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rs232Config {
    /// Host device or file standing in for the serial cable
    pub device_path: PathBuf,
    /// Whether RS-232 emulation is enabled at all
    pub enabled: bool,
    /// Whether `init` starts the background reader
    pub reader_enabled: bool,
    /// Pause between reads while connected and no data is pending
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    /// Pause between reconnection checks while disconnected
    #[serde(with = "duration_str")]
    pub idle_interval: Duration,
    /// Line parameters applied every time the endpoint is opened
    pub default_line: LineParams,
}

impl Default for Rs232Config {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/ttyS0"),
            enabled: false,
            reader_enabled: true,
            poll_interval: Duration::from_millis(2),
            idle_interval: Duration::from_millis(20),
            default_line: LineParams::DEFAULT,
        }
    }
}

impl Rs232Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host device path
    pub fn device_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.device_path = path.into();
        self
    }

    /// Enable or disable RS-232
    pub fn enabled(mut self, enable: bool) -> Self {
        self.enabled = enable;
        self
    }

    /// Enable or disable the background reader
    pub fn reader_enabled(mut self, enable: bool) -> Self {
        self.reader_enabled = enable;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Set the line parameters applied on open
    pub fn default_line(mut self, line: LineParams) -> Self {
        self.default_line = line;
        self
    }

    /// Replace the device path with `$RS232_DEVICE` when it is set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(DEVICE_ENV).filter(|p| !p.is_empty()) {
            self.device_path = PathBuf::from(path);
        }
        self
    }

    /// Load a configuration file, YAML or JSON depending on its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        let config: Rs232Config = if is_yaml {
            serde_yaml::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid YAML {}: {}", path.display(), e)))?
        } else {
            serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid JSON {}: {}", path.display(), e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.device_path.as_os_str().is_empty() {
            return Err(Error::Config("device path must not be empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".into()));
        }
        if self.idle_interval.is_zero() {
            return Err(Error::Config("idle interval must be non-zero".into()));
        }
        if self.idle_interval > MAX_IDLE_INTERVAL {
            return Err(Error::Config(format!(
                "idle interval must be at most {}",
                humantime::format_duration(MAX_IDLE_INTERVAL)
            )));
        }
        Ok(())
    }
}

/// Durations as humantime strings ("2ms", "1s 500ms").
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
