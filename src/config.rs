//! # Configuration Management Module
//!
//! Persistent settings stored in platform-appropriate locations, plus the
//! validated configuration a recording session runs with.
//!
//! ## Settings
//! - `sample_rate_hz`: Recording rate, 5 to 500 Hz
//! - `duration_secs`: Recording window in seconds
//! - `monitor_refresh_hz`: Refresh rate of the live preview
//! - `monitor_duration_secs`: How long a live preview runs before stopping
//! - `output_dir`: Optional override for where recordings are written
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/imu-recorder/config.toml
//! - Linux: ~/.config/imu-recorder/config.toml
//! - Windows: %APPDATA%\imu-recorder\config.toml

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowest accepted recording rate
pub const MIN_RATE_HZ: u32 = 5;
/// Highest accepted recording rate
pub const MAX_RATE_HZ: u32 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sample_rate_hz: u32,
    pub duration_secs: f64,
    pub monitor_refresh_hz: u32,
    pub monitor_duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100,
            duration_secs: 10.0,
            monitor_refresh_hz: 20,
            monitor_duration_secs: 30.0,
            output_dir: None,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("imu-recorder")
            .join("config.toml")
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Write config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Validated recording configuration from these settings
    pub fn recording(&self) -> Result<RecordingConfig, ConfigError> {
        RecordingConfig::new(self.sample_rate_hz, self.duration_secs)
    }

    /// Validated live preview window
    pub fn monitor_duration(&self) -> Result<Duration, ConfigError> {
        positive_duration(self.monitor_duration_secs)
    }
}

/// Rate and duration of a recording, valid by construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingConfig {
    rate_hz: u32,
    duration: Duration,
}

impl RecordingConfig {
    pub fn new(rate_hz: u32, duration_secs: f64) -> Result<Self, ConfigError> {
        if !(MIN_RATE_HZ..=MAX_RATE_HZ).contains(&rate_hz) {
            return Err(ConfigError::InvalidRate {
                rate_hz,
                min: MIN_RATE_HZ,
                max: MAX_RATE_HZ,
            });
        }

        Ok(Self {
            rate_hz,
            duration: positive_duration(duration_secs)?,
        })
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Rows a full session is expected to produce, `rate × duration`
    pub fn expected_samples(&self) -> f64 {
        f64::from(self.rate_hz) * self.duration.as_secs_f64()
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            rate_hz: 100,
            duration: Duration::from_secs(10),
        }
    }
}

fn positive_duration(secs: f64) -> Result<Duration, ConfigError> {
    if !(secs.is_finite() && secs > 0.0) {
        return Err(ConfigError::InvalidDuration(secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidDuration(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sample_rate_hz, 100);
        assert_eq!(config.duration_secs, 10.0);
        assert!(config.output_dir.is_none());
        assert!(config.recording().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            sample_rate_hz: 60,
            duration_secs: 1.5,
            ..Config::default()
        };

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("sample_rate_hz = 60"));
        assert!(toml_str.contains("duration_secs = 1.5"));
        assert!(!toml_str.contains("output_dir"));
    }

    #[test]
    fn test_config_deserialization_fills_defaults() {
        let toml_str = r#"
            sample_rate_hz = 250
            output_dir = "/tmp/recordings"
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.sample_rate_hz, 250);
        assert_eq!(config.duration_secs, 10.0);
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/recordings")));
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("imu-recorder").join("config.toml");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        let config = Config {
            sample_rate_hz: 200,
            monitor_refresh_hz: 30,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "sample_rate_hz = \"fast\"").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_rate_bounds() {
        assert!(RecordingConfig::new(MIN_RATE_HZ, 1.0).is_ok());
        assert!(RecordingConfig::new(MAX_RATE_HZ, 1.0).is_ok());
        assert!(matches!(
            RecordingConfig::new(3, 1.0),
            Err(ConfigError::InvalidRate { rate_hz: 3, .. })
        ));
        assert!(RecordingConfig::new(501, 1.0).is_err());
    }

    #[test]
    fn test_duration_must_be_positive() {
        assert!(RecordingConfig::new(60, 0.0).is_err());
        assert!(RecordingConfig::new(60, -1.0).is_err());
        assert!(RecordingConfig::new(60, f64::NAN).is_err());
        assert!(RecordingConfig::new(60, f64::INFINITY).is_err());

        let config = RecordingConfig::new(60, 0.25).unwrap();
        assert_eq!(config.duration(), Duration::from_millis(250));
        assert_eq!(config.expected_samples(), 15.0);
    }
}
