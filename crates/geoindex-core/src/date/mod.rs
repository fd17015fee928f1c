pub mod exif;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

/// Timestamp layout used by the catalog's `added` and `taken` fields.
pub const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn to_iso8601(dt: DateTime<Utc>) -> String {
    dt.format(ISO8601_FORMAT).to_string()
}

/// Parse a catalog timestamp back into UTC.
///
/// The canonical `YYYY-MM-DDTHH:MM:SSZ` form is tried first; RFC 3339 strings
/// with an explicit offset (as written by older tooling) are converted to UTC.
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, ISO8601_FORMAT) {
        return Some(dt.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Calendar day, as shown in the geotag report.
pub fn format_day(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// Signed offset of a track fix relative to the photo, e.g. `-0d 3h`.
/// The fix time is truncated to the minute before comparing.
pub fn offset_days_hours(photo: DateTime<Utc>, fix: DateTime<Utc>) -> String {
    let fix = fix
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(fix);
    let delta = fix - photo;
    let seconds = delta.num_seconds().unsigned_abs();
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let sign = if delta.num_milliseconds() < 0 { "-" } else { "+" };
    format!("{}{}d {}h", sign, days, hours)
}
