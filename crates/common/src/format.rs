//! Unit conversion and parsing helpers for values reported by the engine.
//!
//! Parsing is strict: an unknown duration unit is an error, never a default.

use chrono::DateTime;

use crate::error::{PlanwatchError, Result};

const MS_PER_HOUR: f64 = 1000.0 * 60.0 * 60.0;

/// Convert milliseconds to (fractional) hours.
pub fn ms_to_hours(ms: f64) -> f64 {
    ms / MS_PER_HOUR
}

/// Convert (fractional) hours to milliseconds.
pub fn hours_to_ms(hours: f64) -> f64 {
    hours * MS_PER_HOUR
}

/// Parse a duration string such as `"10 ms"`, `"1.5 s"`, `"2.0 m"` or `"3 h"`.
pub fn parse_duration_ms(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| PlanwatchError::UnsupportedUnit(format!("missing unit in '{raw}'")))?;
    let (value, unit) = trimmed.split_at(split);
    let value = value
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .map_err(|e| PlanwatchError::Snapshot(format!("invalid duration value '{raw}': {e}")))?;
    let factor = match unit.trim() {
        "ms" => 1.0,
        "s" => 1000.0,
        "m" => 60.0 * 1000.0,
        "h" => MS_PER_HOUR,
        other => return Err(PlanwatchError::UnsupportedUnit(other.to_string())),
    };
    Ok(value * factor)
}

/// Parse an engine timestamp (`2023-06-25T10:12:11.123GMT`) to unix milliseconds.
pub fn parse_timestamp_ms(raw: &str) -> Result<u64> {
    let normalized = raw.trim().replace("GMT", "Z");
    let parsed = DateTime::parse_from_rfc3339(&normalized)
        .map_err(|e| PlanwatchError::Snapshot(format!("invalid timestamp '{raw}': {e}")))?;
    u64::try_from(parsed.timestamp_millis())
        .map_err(|_| PlanwatchError::Snapshot(format!("timestamp before epoch: '{raw}'")))
}

/// Render a byte count with binary units, e.g. `1.5 KiB`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", UNITS[unit])
}

/// Render a duration with the largest fitting unit (`d`, `h`, `m`, `s`).
pub fn humanize_duration(ms: f64, round_seconds: bool) -> String {
    let seconds = ms / 1000.0;
    if seconds >= 86_400.0 {
        format!("{:.1}d", seconds / 86_400.0)
    } else if seconds >= 3600.0 {
        format!("{:.1}h", seconds / 3600.0)
    } else if seconds >= 60.0 {
        format!("{:.1}m", seconds / 60.0)
    } else if round_seconds {
        format!("{seconds:.0}s")
    } else {
        format!("{seconds:.1}s")
    }
}
