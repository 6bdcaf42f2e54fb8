//! # Output Encoder
//!
//! Serializes a recording buffer to comma-separated text. Fields are numeric
//! strings or ISO timestamps by construction, so nothing is quoted.

use crate::row::Row;

const SEPARATOR: &str = ",";
const TERMINATOR: &str = "\n";

/// Encode `rows` in order, one line per row, each line newline-terminated
pub fn encode(rows: &[Row]) -> Vec<u8> {
    let mut out = String::with_capacity(rows.len() * 128);
    for row in rows {
        out.push_str(&row.fields().join(SEPARATOR));
        out.push_str(TERMINATOR);
    }
    out.into_bytes()
}
