use std::fs;
use std::io::Cursor;
use std::path::Path;

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::{Bytes, ImageEXIF};

use crate::error::{GeoindexError, Result};
use crate::photo::read_exif;

/// Tags the EXIF writer regenerates itself or cannot carry over.
const REBUILT_TAGS: &[Tag] = &[
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::StripOffsets,
    Tag::StripByteCounts,
    Tag::TileOffsets,
    Tag::TileByteCounts,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
];

const GPS_TAGS: &[Tag] = &[
    Tag::GPSLatitudeRef,
    Tag::GPSLatitude,
    Tag::GPSLongitudeRef,
    Tag::GPSLongitude,
];

enum Container {
    Jpeg,
    Png,
}

impl Container {
    fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => Ok(Container::Jpeg),
            "png" => Ok(Container::Png),
            _ => Err(GeoindexError::Unsupported(path.display().to_string())),
        }
    }
}

/// Decimal degrees as EXIF degrees/minutes/seconds rationals.
/// Seconds are kept to hundredths.
pub fn dms_rationals(value: f64) -> [Rational; 3] {
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes_f = (abs - degrees) * 60.0;
    let minutes = minutes_f.trunc();
    let seconds = (minutes_f - minutes) * 60.0;
    [
        Rational { num: degrees as u32, denom: 1 },
        Rational { num: minutes as u32, denom: 1 },
        Rational { num: (seconds * 100.0) as u32, denom: 100 },
    ]
}

fn ascii(s: &str) -> Value {
    Value::Ascii(vec![s.as_bytes().to_vec()])
}

/// The four GPS fields for a position; hemisphere refs follow the sign.
pub fn gps_fields(lat: f64, lon: f64) -> Vec<Field> {
    vec![
        Field {
            tag: Tag::GPSLatitudeRef,
            ifd_num: In::PRIMARY,
            value: ascii(if lat >= 0.0 { "N" } else { "S" }),
        },
        Field {
            tag: Tag::GPSLatitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(dms_rationals(lat).to_vec()),
        },
        Field {
            tag: Tag::GPSLongitudeRef,
            ifd_num: In::PRIMARY,
            value: ascii(if lon >= 0.0 { "E" } else { "W" }),
        },
        Field {
            tag: Tag::GPSLongitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(dms_rationals(lon).to_vec()),
        },
    ]
}

fn is_carried_over(field: &Field) -> bool {
    field.ifd_num == In::PRIMARY
        && !REBUILT_TAGS.contains(&field.tag)
        && !GPS_TAGS.contains(&field.tag)
        && !matches!(field.value, Value::Unknown(..))
}

/// Serialize the photo's primary-IFD EXIF fields with the GPS position merged in.
fn rebuild_exif(path: &Path, lat: f64, lon: f64) -> Result<Vec<u8>> {
    let mut fields: Vec<Field> = Vec::new();
    if let Some(exif) = read_exif(path)? {
        for field in exif.fields().filter(|f| is_carried_over(f)) {
            fields.push(Field {
                tag: field.tag,
                ifd_num: field.ifd_num,
                value: field.value.clone(),
            });
        }
    }
    fields.extend(gps_fields(lat, lon));

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false)?;
    Ok(buf.into_inner())
}

/// Write a GPS position into the photo's embedded metadata.
///
/// Unrelated primary-IFD tags are preserved; the file is replaced via a
/// temporary sibling and a rename.
pub fn write_geotag(path: &Path, lat: f64, lon: f64) -> Result<()> {
    let container = Container::from_path(path)?;
    let exif_bytes = Bytes::from(rebuild_exif(path, lat, lon)?);
    let image_bytes = Bytes::from(fs::read(path)?);

    let output = match container {
        Container::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(image_bytes)?;
            jpeg.set_exif(Some(exif_bytes));
            jpeg.encoder().bytes()
        }
        Container::Png => {
            let mut png = Png::from_bytes(image_bytes)?;
            png.set_exif(Some(exif_bytes));
            png.encoder().bytes()
        }
    };

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".geotag.tmp");
    let temp_path = Path::new(&temp_name);
    fs::write(temp_path, &output)?;
    if let Err(e) = fs::rename(temp_path, path) {
        let _ = fs::remove_file(temp_path);
        return Err(e.into());
    }
    log::debug!("Wrote GPS ({:.6},{:.6}) to {}", lat, lon, path.display());
    Ok(())
}
