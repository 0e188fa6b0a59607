//! Timestamp conversions for artifact databases

use chrono::{DateTime, Utc};

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z
pub const APPLE_EPOCH_OFFSET: i64 = 978_307_200;

/// Converts Apple absolute time (seconds since 2001-01-01 UTC) to UTC.
pub fn from_apple_time(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }

    let unix = seconds + APPLE_EPOCH_OFFSET as f64;
    let whole = unix.floor();
    let nanos = (((unix - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Like [`from_apple_time`], treating a missing or zero value as unknown
pub fn from_apple_time_opt(seconds: Option<f64>) -> Option<DateTime<Utc>> {
    seconds.filter(|s| *s != 0.0).and_then(from_apple_time)
}

pub fn from_unix_time(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}
