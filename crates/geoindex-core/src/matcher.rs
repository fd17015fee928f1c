use chrono::{DateTime, Utc};

use crate::track::Trackpoint;

/// Outcome of correlating one photo timestamp against the track log.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackMatch<'a> {
    /// Closest fix in time, if it lies strictly inside the window.
    pub best: Option<&'a Trackpoint>,
    /// Latest fix at or before the photo.
    pub before: Option<&'a Trackpoint>,
    /// Earliest fix strictly after the photo.
    pub after: Option<&'a Trackpoint>,
}

/// Find the trackpoint nearest in time to `photo_time`.
///
/// `best` is only set when the absolute difference is strictly less than
/// `window_secs`; on ties the first point scanned wins. `before` and `after`
/// bracket the photo and are reported even when there is no `best`.
///
/// The scan is linear and does not require `trackpoints` to be sorted.
pub fn match_trackpoint(
    photo_time: DateTime<Utc>,
    trackpoints: &[Trackpoint],
    window_secs: i64,
) -> TrackMatch<'_> {
    let window_ms = window_secs.saturating_mul(1000);
    let mut best_diff_ms = window_ms;
    let mut result = TrackMatch::default();

    for p in trackpoints {
        if p.time <= photo_time {
            if result.before.map_or(true, |b| p.time > b.time) {
                result.before = Some(p);
            }
        } else if result.after.map_or(true, |a| p.time < a.time) {
            result.after = Some(p);
        }

        let diff_ms = (p.time - photo_time).num_milliseconds().abs();
        if diff_ms < best_diff_ms {
            best_diff_ms = diff_ms;
            result.best = Some(p);
        }
    }

    result
}
