//! # Row Assembly Module
//!
//! Turns the latest sensor snapshot into one fixed-width CSV row.
//!
//! Column order is fixed:
//! `timestamp_iso, epoch_ms, acc_x, acc_y, acc_z, gyro_x, gyro_y, gyro_z, mag_x, mag_y, mag_z`
//!
//! A sensor that has not reported yet is not an error; its three axis
//! fields carry the `NaN` sentinel.

use crate::sensor::{LatestSensorState, SensorKind};
use chrono::{DateTime, SecondsFormat, Utc};

/// Number of fields in every row, header included
pub const COLUMN_COUNT: usize = 11;

/// Axis value written for a sensor that has not reported
pub const MISSING_SENTINEL: &str = "NaN";

/// Digits after the decimal point for axis values
const AXIS_PRECISION: usize = 6;

const HEADER: [&str; COLUMN_COUNT] = [
    "timestamp_iso",
    "epoch_ms",
    "acc_x",
    "acc_y",
    "acc_z",
    "gyro_x",
    "gyro_y",
    "gyro_z",
    "mag_x",
    "mag_y",
    "mag_z",
];

/// One immutable CSV record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    /// The fixed header row
    pub fn header() -> Self {
        Self {
            fields: HEADER.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Epoch milliseconds of a data row, `None` for the header
    pub fn epoch_ms(&self) -> Option<i64> {
        self.fields.get(1)?.parse().ok()
    }

    /// The nine axis fields in column order
    pub fn axis_fields(&self) -> &[String] {
        &self.fields[2..]
    }
}

/// Assemble a row stamped with the current wall-clock time
pub fn assemble(latest: &LatestSensorState) -> Row {
    assemble_at(Utc::now(), latest)
}

/// Assemble a row for the instant `now`
pub fn assemble_at(now: DateTime<Utc>, latest: &LatestSensorState) -> Row {
    let mut fields = Vec::with_capacity(COLUMN_COUNT);
    fields.push(now.to_rfc3339_opts(SecondsFormat::Millis, true));
    fields.push(now.timestamp_millis().to_string());

    for kind in SensorKind::ALL {
        match latest.get(kind) {
            Some(sample) => fields.extend(sample.axes().iter().map(|&v| format_axis(v))),
            None => fields.extend((0..3).map(|_| MISSING_SENTINEL.to_string())),
        }
    }

    Row { fields }
}

fn format_axis(value: f64) -> String {
    if value.is_finite() {
        format!("{:.*}", AXIS_PRECISION, value)
    } else {
        MISSING_SENTINEL.to_string()
    }
}
