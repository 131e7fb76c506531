//! Human-readable formatting for sizes and expiry instants

use chrono::{Local, TimeZone};

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte count with binary units, e.g. `1536` → `"1.50KB"`.
///
/// Whole-byte values stay integral; larger units carry two decimals.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}

/// Format a unix-seconds timestamp as a local `YYYY-MM-DD HH:MM:SS` string.
///
/// Out-of-range timestamps render as an empty string rather than panicking.
pub fn human_datetime(unix_secs: i64) -> String {
    match Local.timestamp_opt(unix_secs, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}
