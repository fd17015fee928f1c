use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use walkdir::WalkDir;

use crate::error::Result;

/// One timestamped position sample from a GPS track log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trackpoint {
    pub latitude: f64,
    pub longitude: f64,
    pub time: DateTime<Utc>,
}

/// Recursively find `.gpx` files under `dir`, in file-name order.
pub fn find_gpx_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Cannot read track directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let is_gpx = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gpx"));
        if is_gpx {
            log::debug!("Found GPX file: {}", entry.path().display());
            files.push(entry.into_path());
        }
    }
    files
}

/// Load every timestamped trackpoint under `dir` into one time-sorted sequence.
///
/// Files that fail to parse are skipped. Points with equal timestamps keep
/// the order in which their files were encountered.
pub fn load_trackpoints(dir: &Path) -> Vec<Trackpoint> {
    let mut points = Vec::new();
    for path in find_gpx_files(dir) {
        match read_gpx(&path) {
            Ok(mut file_points) => {
                log::debug!("{}: {} trackpoints", path.display(), file_points.len());
                points.append(&mut file_points);
            }
            Err(e) => log::warn!("Skipping GPX file {}: {}", path.display(), e),
        }
    }
    points.sort_by_key(|p| p.time);
    points
}

pub fn read_gpx(path: &Path) -> Result<Vec<Trackpoint>> {
    let file = File::open(path)?;
    parse_gpx(BufReader::new(file))
}

/// Flatten tracks/segments/points, dropping points without a time.
pub fn parse_gpx<R: Read>(reader: R) -> Result<Vec<Trackpoint>> {
    let gpx = gpx::read(reader)?;
    let points = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .filter_map(|wp| {
            let time = to_utc(wp.time.clone()?)?;
            let point = wp.point();
            Some(Trackpoint {
                latitude: point.y(),
                longitude: point.x(),
                time,
            })
        })
        .collect();
    Ok(points)
}

fn to_utc(time: gpx::Time) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::from(time);
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}
