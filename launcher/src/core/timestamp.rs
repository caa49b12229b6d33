//! UTC stamps used for log file names and banners.

use chrono::{DateTime, Utc};

/// Compact stamp used in log file names, e.g. `20261016T041502Z`.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Human-readable stamp used in banners, e.g. `2026-10-16 04:15:02 UTC`.
pub fn banner_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Log file name for an invocation started at `at`.
pub fn log_file_name(at: DateTime<Utc>) -> String {
    format!("run_{}.log", file_stamp(at))
}
