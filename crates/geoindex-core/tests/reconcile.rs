use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use geoindex_core::photo::read_photo;
use geoindex_core::{run, Catalog, IndexOptions};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use tempfile::{tempdir, TempDir};

const CITIES: &str = "city,city_ascii,lat,lng,country\nParis,Paris,48.8567,2.3522,France\n";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::create_dir_all(dir.path().join("gpx")).unwrap();
        fs::write(dir.path().join("cities.csv"), CITIES).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn key(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().to_string()
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            gpx_dir: self.path("gpx"),
            image_dir: self.path("images"),
            catalog_path: self.path("images.json"),
            cities_csv: self.path("cities.csv"),
            offline: true,
            ..IndexOptions::default()
        }
    }

    fn photo(&self, rel: &str, taken: Option<&str>) -> PathBuf {
        let path = self.path(rel);
        image::RgbImage::new(20, 10).save(&path).unwrap();
        if let Some(taken) = taken {
            set_capture_time(&path, taken);
        }
        path
    }

    fn track(&self, name: &str, lat: f64, lon: f64, time: &str) {
        let gpx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="geoindex-test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg><trkpt lat="{}" lon="{}"><time>{}</time></trkpt></trkseg></trk>
</gpx>
"#,
            lat, lon, time
        );
        fs::write(self.path("gpx").join(name), gpx).unwrap();
    }

    fn catalog_text(&self) -> String {
        fs::read_to_string(self.path("images.json")).unwrap()
    }

    fn catalog(&self) -> Catalog {
        Catalog::load(&self.path("images.json")).unwrap()
    }
}

fn set_capture_time(path: &Path, taken: &str) {
    let field = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![taken.as_bytes().to_vec()]),
    };
    let mut writer = Writer::new();
    writer.push_field(&field);
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();

    let mut jpeg = Jpeg::from_bytes(Bytes::from(fs::read(path).unwrap())).unwrap();
    jpeg.set_exif(Some(Bytes::from(buf.into_inner())));
    fs::write(path, jpeg.encoder().bytes()).unwrap();
}

fn quiet(_: &str, _: u64, _: u64, _: &str) {}

#[test]
fn geotags_from_track_and_second_run_is_stable() {
    let ws = Workspace::new();
    let photo = ws.photo("images/eiffel.jpg", Some("2023:07:14 12:00:00"));
    ws.track("walk.gpx", 48.8584, 2.2945, "2023-07-14T11:55:00Z");

    let first = run(&ws.options(), &quiet).unwrap();
    assert_eq!(first.total_files, 1);
    assert_eq!(first.added, 1);
    assert_eq!(first.updated_taken, 1);
    assert_eq!(first.geotag_updated, 1);
    assert_eq!(
        first.photos[0].headline(),
        format!(
            "UPDATED: {} -> Paris, France at 2023-07-14",
            ws.key("images/eiffel.jpg")
        )
    );

    let gps = read_photo(&photo).gps.expect("photo geotagged");
    assert!((gps.latitude - 48.8584).abs() < 1e-4);
    assert!((gps.longitude - 2.2945).abs() < 1e-4);

    let entry = &ws.catalog().images[0];
    assert_eq!(entry.taken, "2023-07-14T12:00:00Z");
    assert_eq!(entry.location, "Paris, France");
    assert_eq!((entry.width, entry.height), (Some(20), Some(10)));

    let saved = ws.catalog_text();
    let second = run(&ws.options(), &quiet).unwrap();
    assert_eq!(ws.catalog_text(), saved);
    assert_eq!(second.added + second.updated_taken + second.updated_location, 0);
    assert_eq!(second.geotag_updated, 0);
    assert!(second.photos[0].headline().starts_with("SKIP (already geotagged): "));
    assert_eq!(second.photos[0].lines[1], "  Photo geotag: Paris, France");
}

#[test]
fn user_fields_survive_and_undated_photo_is_reported() {
    let ws = Workspace::new();
    ws.photo("images/sunset.jpg", None);
    let key = ws.key("images/sunset.jpg");
    let catalog = format!(
        r#"[{{"path":"{}","title":"Sunset","tags":["beach"],"original_link":"https://example.org/sunset","rating":5}}]"#,
        key
    );
    fs::write(ws.path("images.json"), catalog).unwrap();

    let summary = run(&ws.options(), &quiet).unwrap();
    assert_eq!(summary.photos[0].headline(), format!("MISSING TIMESTAMP: {}", key));
    assert_eq!(summary.geotag_updated, 0);

    let entry = &ws.catalog().images[0];
    assert_eq!(entry.title, "Sunset");
    assert_eq!(entry.tags, vec!["beach"]);
    assert_eq!(entry.original_link, "https://example.org/sunset");
    assert_eq!(entry.extra["rating"], 5);
    assert_eq!(entry.taken, "");
    assert!(!entry.added.is_empty());

    let text = ws.catalog_text();
    assert!(text.starts_with("{\n  \"images\": [\n    {\"path\":"));
    assert!(text.ends_with("  \"pruned\": [\n  ]\n}\n"));
}

#[test]
fn dry_run_leaves_photos_alone_but_saves_catalog() {
    let ws = Workspace::new();
    let photo = ws.photo("images/a.jpg", Some("2023:07:14 12:00:00"));
    ws.track("walk.gpx", 48.8584, 2.2945, "2023-07-14T12:10:00Z");
    let bytes = fs::read(&photo).unwrap();

    let options = IndexOptions {
        dry_run: true,
        ..ws.options()
    };
    let summary = run(&options, &quiet).unwrap();

    assert!(summary.photos[0].headline().starts_with("WOULD UPDATE: "));
    assert_eq!(summary.geotag_updated, 0);
    assert_eq!(fs::read(&photo).unwrap(), bytes);
    assert_eq!(ws.catalog().images[0].taken, "2023-07-14T12:00:00Z");
    assert_eq!(ws.catalog().images[0].location, "");
}

#[test]
fn window_boundary_is_exclusive() {
    let ws = Workspace::new();
    ws.photo("images/a.jpg", Some("2023:07:14 12:00:00"));
    let options = IndexOptions {
        dry_run: true,
        ..ws.options()
    };

    ws.track("walk.gpx", 48.8584, 2.2945, "2023-07-14T13:00:00Z");
    let summary = run(&options, &quiet).unwrap();
    let lines = &summary.photos[0].lines;
    assert!(lines[0].starts_with("NO MATCH: "));
    assert_eq!(lines[1], "  Photo Time: 2023-07-14");
    assert_eq!(lines[2], "  No GPX point before photo.");
    assert_eq!(lines[3], "  Closest After: 2023-07-14 Paris, France +0d 1h");

    ws.track("walk.gpx", 48.8584, 2.2945, "2023-07-14T12:59:59Z");
    let summary = run(&options, &quiet).unwrap();
    assert!(summary.photos[0].headline().starts_with("WOULD UPDATE: "));
}

#[test]
fn prune_moves_missing_entries() {
    let ws = Workspace::new();
    ws.photo("images/kept.jpg", None);
    ws.photo("images/gone.jpg", None);
    run(&ws.options(), &quiet).unwrap();
    assert_eq!(ws.catalog().images.len(), 2);

    fs::remove_file(ws.path("images/gone.jpg")).unwrap();
    let summary = run(&ws.options(), &quiet).unwrap();
    assert_eq!(summary.pruned, 0);
    assert_eq!(ws.catalog().images.len(), 2);

    let options = IndexOptions {
        prune: true,
        ..ws.options()
    };
    let summary = run(&options, &quiet).unwrap();
    assert_eq!(summary.pruned, 1);
    let catalog = ws.catalog();
    assert_eq!(catalog.images.len(), 1);
    assert_eq!(catalog.images[0].path, ws.key("images/kept.jpg"));
    assert_eq!(catalog.pruned[0].path, ws.key("images/gone.jpg"));
}

#[test]
fn corrupt_catalog_is_backed_up_and_rebuilt() {
    let ws = Workspace::new();
    ws.photo("images/a.jpg", None);
    fs::write(ws.path("images.json"), "{ \"images\": [ broken").unwrap();

    let summary = run(&ws.options(), &quiet).unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(
        fs::read_to_string(ws.path("images.json.bak")).unwrap(),
        "{ \"images\": [ broken"
    );
    assert_eq!(ws.catalog().images.len(), 1);
}

#[test]
fn catalog_is_ordered_by_date_taken() {
    let ws = Workspace::new();
    ws.photo("images/old.jpg", Some("2019:05:01 08:00:00"));
    ws.photo("images/new.jpg", Some("2022:05:01 08:00:00"));
    ws.photo("images/undated.jpg", None);

    let summary = run(&ws.options(), &quiet).unwrap();
    let order: Vec<String> = ws.catalog().images.into_iter().map(|e| e.path).collect();
    assert_eq!(
        order,
        vec![
            ws.key("images/new.jpg"),
            ws.key("images/old.jpg"),
            ws.key("images/undated.jpg"),
        ]
    );
    let reported: Vec<&str> = summary.photos.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(reported, order.iter().map(String::as_str).collect::<Vec<_>>());
}
