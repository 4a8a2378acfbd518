//! Time parsing and formatting utilities

use crate::error::{TrimGridError, TrimGridResult};

/// Parse a user-supplied time into milliseconds.
///
/// Accepts plain seconds (`90.5`), `MM:SS[.mmm]` and `HH:MM:SS[.mmm]`.
pub fn parse_time_ms(time_str: &str) -> TrimGridResult<u64> {
    let time_str = time_str.trim();
    let invalid = || TrimGridError::InvalidTimeFormat {
        time: time_str.to_string(),
    };

    let parts: Vec<&str> = time_str.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [secs] => (0u64, 0u64, *secs),
        [mins, secs] => (0, mins.parse::<u64>().map_err(|_| invalid())?, *secs),
        [hrs, mins, secs] => (
            hrs.parse::<u64>().map_err(|_| invalid())?,
            mins.parse::<u64>().map_err(|_| invalid())?,
            *secs,
        ),
        _ => return Err(invalid()),
    };

    let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    if parts.len() > 1 && (seconds >= 60.0 || (parts.len() == 3 && minutes >= 60)) {
        return Err(invalid());
    }

    let millis = (seconds * 1000.0).round();
    if millis >= u64::MAX as f64 {
        return Err(invalid());
    }
    hours
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(minutes.checked_mul(60_000)?))
        .and_then(|ms| ms.checked_add(millis as u64))
        .ok_or_else(invalid)
}

/// Format milliseconds as `HH:MM:SS.mmm`
pub fn format_timestamp(ms: u64) -> String {
    let (secs, millis) = (ms / 1000, ms % 1000);
    let (hours, rem) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Same as `format_timestamp`, but unknown or negative positions show as zero
pub fn format_position(ms: Option<i64>) -> String {
    format_timestamp(ms.filter(|v| *v > 0).unwrap_or(0) as u64)
}

/// Filename-safe timestamp: `HH-MM-SS-mmm`
pub fn format_timestamp_for_filename(ms: u64) -> String {
    format_timestamp(ms).replace([':', '.'], "-")
}

/// Seconds with millisecond precision, as passed to `-ss` / `-t`
pub fn format_seconds_arg(seconds: f64) -> String {
    format!("{:.3}", seconds)
}
