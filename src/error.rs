//! # Error Types Module
//!
//! Centralized error handling for the recorder.
//! One error enum per concern, each carrying enough context to be logged
//! or shown to the operator as-is.
//!
//! ## Error Types
//! - `ConfigError`: Settings file I/O and recording configuration validation
//! - `StorageError`: Output directory resolution and file writes
//! - `SensorError`: Sensor source subscription failures
//! - `ClockError`: Sample clock start failures
//! - `RecorderError`: Recording session start failures
//!
//! ## Usage Examples
//! ```ignore
//! // Config module uses ConfigError
//! pub fn load() -> Result<Config, ConfigError> { ... }
//! pub fn new(rate_hz: u32, duration_secs: f64) -> Result<RecordingConfig, ConfigError> { ... }
//!
//! // Storage module uses StorageError
//! pub fn write_recording(...) -> Result<PathBuf, StorageError> { ... }
//! ```
//!
//! A missing sensor value is never an error: it is rendered as a `NaN`
//! field by the row assembler.

use crate::sensor::SensorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadFailed(#[source] std::io::Error),
    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteFailed(#[source] std::io::Error),
    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    /// Sample rate outside the supported range
    #[error("Sample rate {rate_hz} Hz is outside {min}..={max} Hz")]
    InvalidRate { rate_hz: u32, min: u32, max: u32 },
    /// Duration is zero, negative or not a number
    #[error("Recording duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f64),
    /// Configuration is frozen while a recording is running
    #[error("Configuration cannot change while a recording is active")]
    SessionActive,
}

/// Errors raised while resolving or writing the output file
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage collaborator could not supply a directory
    #[error("No writable storage location available")]
    NoLocation,
    /// Output directory could not be created
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Encoded recording could not be written
    #[error("Failed to write recording to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by sensor sources
#[derive(Debug, Error)]
pub enum SensorError {
    /// The platform has no sensor of this kind
    #[error("{0} sensor is not available")]
    Unavailable(SensorKind),
    /// Delivery thread could not be started
    #[error("Failed to start {kind} delivery thread: {source}")]
    Spawn {
        kind: SensorKind,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised when starting a sample clock
#[derive(Debug, Error)]
pub enum ClockError {
    /// A zero period would spin without ever sleeping
    #[error("Sample clock period must be non-zero")]
    ZeroPeriod,
    /// Timer thread could not be started
    #[error("Failed to spawn sample clock thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors that can occur when starting a session
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Sample clock failed to start: {0}")]
    Clock(#[from] ClockError),
}
