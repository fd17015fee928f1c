use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::date::{format_day, offset_days_hours};
use crate::place::{haversine_km, PlaceResolver};
use crate::track::Trackpoint;

/// Geotag decision log for one photo. The first line is the headline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoReport {
    pub path: String,
    pub time: Option<DateTime<Utc>>,
    pub lines: Vec<String>,
}

impl PhotoReport {
    pub fn headline(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }
}

/// Counters and logs for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_files: usize,
    pub added: usize,
    pub updated_taken: usize,
    pub updated_location: usize,
    pub updated_size: usize,
    pub geotag_updated: usize,
    pub skipped: usize,
    pub pruned: usize,
    pub errors: Vec<String>,
    pub details: Vec<String>,
    /// Newest photo first; photos without a time last.
    pub photos: Vec<PhotoReport>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Geotag & Index Summary ---")?;
        writeln!(f, "Total image files found: {}", self.total_files)?;
        writeln!(f, "New images added: {}", self.added)?;
        writeln!(f, "Images with updated date taken: {}", self.updated_taken)?;
        writeln!(f, "Images with updated location: {}", self.updated_location)?;
        writeln!(f, "Images with updated width/height: {}", self.updated_size)?;
        writeln!(f, "Images with updated geotag: {}", self.geotag_updated)?;
        writeln!(f, "Images skipped due to errors: {}", self.skipped)?;
        writeln!(f, "Images pruned: {}", self.pruned)?;

        if !self.errors.is_empty() {
            writeln!(f, "\nErrors encountered:")?;
            for err in &self.errors {
                writeln!(f, " - {}", err)?;
            }
        }

        writeln!(f, "\nDetailed actions:")?;
        for detail in &self.details {
            writeln!(f, " - {}", detail)?;
        }

        writeln!(f, "\n--- Detailed Geotag Output ---")?;
        for photo in &self.photos {
            for line in &photo.lines {
                writeln!(f, "{}", line)?;
            }
        }
        Ok(())
    }
}

fn day_warning(photo_time: DateTime<Utc>, fix: &Trackpoint) -> &'static str {
    if fix.time.date_naive() != photo_time.date_naive() {
        " (different day)"
    } else {
        ""
    }
}

pub(crate) fn closest_before_line(
    photo_time: DateTime<Utc>,
    before: &Trackpoint,
    resolver: &PlaceResolver,
) -> String {
    format!(
        "  Closest Before: {} {} {}{}",
        format_day(before.time),
        resolver.resolve(before.latitude, before.longitude),
        offset_days_hours(photo_time, before.time),
        day_warning(photo_time, before)
    )
}

/// Includes the distance from the `before` fix when there is one.
pub(crate) fn closest_after_line(
    photo_time: DateTime<Utc>,
    after: &Trackpoint,
    before: Option<&Trackpoint>,
    resolver: &PlaceResolver,
) -> String {
    let mut line = format!(
        "  Closest After: {} {} {}{}",
        format_day(after.time),
        resolver.resolve(after.latitude, after.longitude),
        offset_days_hours(photo_time, after.time),
        day_warning(photo_time, after)
    );
    if let Some(b) = before {
        let km = haversine_km(b.latitude, b.longitude, after.latitude, after.longitude);
        line.push_str(&format!(" {:.1} km", km));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fix(lat: f64, lon: f64, h: u32, day: u32) -> Trackpoint {
        Trackpoint {
            latitude: lat,
            longitude: lon,
            time: Utc.with_ymd_and_hms(2023, 7, day, h, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_bracket_lines() {
        let resolver = PlaceResolver::new(vec![]);
        let photo = Utc.with_ymd_and_hms(2023, 7, 14, 12, 0, 0).unwrap();
        let before = fix(0.0, 0.0, 9, 14);
        let after = fix(0.0, 1.0, 2, 15);

        assert_eq!(
            closest_before_line(photo, &before, &resolver),
            "  Closest Before: 2023-07-14 Unknown City/Country (0.00000,0.00000) -0d 3h"
        );
        assert_eq!(
            closest_after_line(photo, &after, Some(&before), &resolver),
            "  Closest After: 2023-07-15 Unknown City/Country (0.00000,1.00000) +0d 14h (different day) 111.2 km"
        );
        assert!(closest_after_line(photo, &after, None, &resolver).ends_with("(different day)"));
    }

    #[test]
    fn test_display_sections() {
        let summary = RunSummary {
            total_files: 2,
            added: 1,
            errors: vec!["images/x.jpg: bad".to_string()],
            details: vec!["Added new image: images/a.jpg".to_string()],
            photos: vec![PhotoReport {
                path: "images/a.jpg".to_string(),
                time: None,
                lines: vec!["MISSING TIMESTAMP: images/a.jpg".to_string()],
            }],
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.contains("Total image files found: 2"));
        assert!(text.contains("New images added: 1"));
        assert!(text.contains("Errors encountered:\n - images/x.jpg: bad"));
        assert!(text.contains(" - Added new image: images/a.jpg"));
        assert!(text.ends_with("--- Detailed Geotag Output ---\nMISSING TIMESTAMP: images/a.jpg\n"));
    }
}
