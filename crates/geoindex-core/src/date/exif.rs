use chrono::NaiveDateTime;

use super::ISO8601_FORMAT;

/// EXIF datetimes carry no timezone; they are device-local time as-is.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` string.
pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(cleaned, EXIF_DATETIME_FORMAT).ok()
}

/// Convert an EXIF datetime string to the catalog's ISO-8601 form.
/// The device-local time is taken as UTC. Invalid input yields an empty string.
pub fn exif_to_iso8601(s: &str) -> String {
    parse_exif_datetime(s)
        .map(|dt| dt.format(ISO8601_FORMAT).to_string())
        .unwrap_or_default()
}
