use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{Exif, In, Reader, Tag, Value};
use walkdir::WalkDir;

use crate::error::Result;

/// Extensions treated as photographs (compared case-insensitively).
pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"];

/// Tags holding a capture time, in priority order.
const CAPTURE_TIME_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// What could be read from one image file.
///
/// Reading never aborts: a failure is recorded in `error` and whatever was
/// decoded before or independently of it is still returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Raw device-local `YYYY:MM:DD HH:MM:SS` string.
    pub capture_time: Option<String>,
    pub gps: Option<GpsCoordinates>,
    pub error: Option<String>,
}

/// Catalog key for a file: forward slashes, no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    let mut p = p.as_str();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.to_string()
}

pub fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PHOTO_EXTENSIONS.iter().any(|p| ext.eq_ignore_ascii_case(p)))
}

/// Recursively list photographs under `dir` as normalized catalog paths,
/// in file-name order.
pub fn find_images(dir: &Path) -> Vec<String> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Cannot read image directory entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_photo(entry.path()) {
            let path = normalize_path(&entry.path().to_string_lossy());
            log::debug!("Found image file: {}", path);
            found.push(path);
        }
    }
    found
}

/// Read dimensions, capture time and embedded GPS position from an image.
pub fn read_photo(path: &Path) -> PhotoMetadata {
    let mut meta = PhotoMetadata::default();

    match image::image_dimensions(path) {
        Ok((w, h)) => {
            meta.width = Some(w);
            meta.height = Some(h);
        }
        Err(e) => meta.error = Some(e.to_string()),
    }

    match read_exif(path) {
        Ok(Some(exif)) => {
            meta.capture_time = capture_time(&exif);
            meta.gps = gps_coordinates(&exif);
        }
        Ok(None) => log::debug!("No EXIF data found in {}", path.display()),
        Err(e) => {
            if meta.error.is_none() {
                meta.error = Some(e.to_string());
            }
        }
    }

    meta
}

/// Read the EXIF block. A file without one is `Ok(None)`.
pub fn read_exif(path: &Path) -> Result<Option<Exif>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => {
            let raw = parts.first()?;
            let s = String::from_utf8_lossy(raw)
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string();
            (!s.is_empty()).then_some(s)
        }
        _ => None,
    }
}

fn capture_time(exif: &Exif) -> Option<String> {
    CAPTURE_TIME_TAGS
        .iter()
        .filter_map(|tag| exif.get_field(*tag, In::PRIMARY))
        .find_map(|field| ascii_value(&field.value))
}

fn dms_to_degrees(value: &Value) -> Option<f64> {
    let Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }
    Some(parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0)
}

fn signed_coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative: u8) -> Option<f64> {
    let degrees = dms_to_degrees(&exif.get_field(value_tag, In::PRIMARY)?.value)?;
    let hemisphere = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| ascii_value(&f.value))
        .and_then(|s| s.bytes().next());
    if hemisphere.is_some_and(|h| h.eq_ignore_ascii_case(&negative)) {
        Some(-degrees)
    } else {
        Some(degrees)
    }
}

/// Embedded GPS position, if both latitude and longitude decode.
pub fn gps_coordinates(exif: &Exif) -> Option<GpsCoordinates> {
    let latitude = signed_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let longitude = signed_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;
    Some(GpsCoordinates { latitude, longitude })
}
