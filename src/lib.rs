//! # imu-recorder
//!
//! Fixed-rate recording of a device's acceleration, angular rate and
//! magnetic field into timestamped CSV files, plus a live preview mode.
//!
//! ## Modules
//! - `sensor`: Sensor sources and the latest-value feed
//! - `clock`: Drift-free periodic timer
//! - `row` / `encoder`: CSV row assembly and encoding
//! - `storage`: Where recordings are written
//! - `recorder`: Recording session state machine
//! - `monitor`: Live preview session
//! - `config`: Persistent settings
//! - `events`: Notifications for whatever renders a session

pub mod clock;
pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod monitor;
pub mod recorder;
pub mod row;
pub mod sensor;
pub mod storage;
