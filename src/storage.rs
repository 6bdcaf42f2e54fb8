//! # Recording Storage Module
//!
//! Resolves where finished recordings go and writes them there.
//!
//! ## Locations
//! - `AppDataDir`: platform data directory
//!   - macOS: ~/Library/Application Support/imu-recorder/recordings
//!   - Linux: ~/.local/share/imu-recorder/recordings
//!   - Windows: %APPDATA%\imu-recorder\recordings
//! - `FixedDir`: an explicit directory, e.g. from `--output` or the config file
//!
//! ## File Naming
//! `sensor_<timestamp>.csv`, where the timestamp is ISO-8601 UTC with the
//! colons and dots removed so it is valid on every filesystem:
//! `sensor_2024-05-01T123045123Z.csv`
//!
//! Existing files are never overwritten. When two recordings finalize in the
//! same millisecond the later one gets a numeric suffix:
//! `sensor_2024-05-01T123045123Z_1.csv`

use crate::error::StorageError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffixed names tried before giving up on a busy timestamp
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Supplies the directory finished recordings are written into
pub trait StorageLocation: Send + Sync {
    fn directory(&self) -> Result<PathBuf, StorageError>;
}

/// The per-user application data directory
#[derive(Debug, Clone, Copy, Default)]
pub struct AppDataDir;

impl StorageLocation for AppDataDir {
    fn directory(&self) -> Result<PathBuf, StorageError> {
        dirs::data_dir()
            .map(|dir| dir.join("imu-recorder").join("recordings"))
            .ok_or(StorageError::NoLocation)
    }
}

/// A caller-chosen directory
#[derive(Debug, Clone)]
pub struct FixedDir(pub PathBuf);

impl StorageLocation for FixedDir {
    fn directory(&self) -> Result<PathBuf, StorageError> {
        Ok(self.0.clone())
    }
}

/// File name for a recording finalized at `at`
pub fn file_name_for(at: DateTime<Utc>) -> String {
    format!("sensor_{}.csv", file_stamp(at))
}

fn file_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .filter(|c| *c != ':' && *c != '.')
        .collect()
}

/// Name for the `attempt`-th try; the first try has no suffix
fn candidate_name(at: DateTime<Utc>, attempt: u32) -> String {
    match attempt {
        0 => file_name_for(at),
        n => format!("sensor_{}_{}.csv", file_stamp(at), n),
    }
}

/// Write an encoded recording into `location`, returning the file path
///
/// Never replaces an existing file.
pub fn write_recording(
    location: &dyn StorageLocation,
    at: DateTime<Utc>,
    bytes: &[u8],
) -> Result<PathBuf, StorageError> {
    let dir = location.directory()?;
    ensure_dir(&dir)?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(candidate_name(at, attempt));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                log::debug!("{} already exists, trying next name", path.display());
                continue;
            }
            Err(source) => return Err(StorageError::Write { path, source }),
        };

        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;

        log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
        return Ok(path);
    }

    Err(StorageError::Write {
        path: dir.join(file_name_for(at)),
        source: io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free file name for this timestamp",
        ),
    })
}

fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}
