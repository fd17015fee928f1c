pub mod catalog;
pub mod date;
pub mod error;
pub mod matcher;
pub mod photo;
pub mod place;
pub mod reconcile;
pub mod report;
pub mod track;
pub mod writer;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use place::{Gazetteer, Geocoder, Nominatim, PlaceResolver, PlaceSource};

pub use catalog::{Catalog, CatalogEntry};
pub use error::{GeoindexError, Result};
pub use reconcile::{reconcile, ReconcileOptions, Reconciliation};
pub use report::{PhotoReport, RunSummary};
pub use track::Trackpoint;

fn default_gpx_dir() -> PathBuf {
    PathBuf::from("GPX_Output")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("images.json")
}

fn default_cities_csv() -> PathBuf {
    PathBuf::from("assets/worldcities.csv")
}

fn default_window_secs() -> i64 {
    3600
}

fn default_geocode_timeout_secs() -> u64 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    #[serde(default = "default_gpx_dir")]
    pub gpx_dir: PathBuf,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    #[serde(default = "default_cities_csv")]
    pub cities_csv: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub prune: bool,
    /// Skip the network geocoder and name places from the gazetteer only.
    #[serde(default)]
    pub offline: bool,
    #[serde(default = "default_geocode_timeout_secs")]
    pub geocode_timeout_secs: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            gpx_dir: default_gpx_dir(),
            image_dir: default_image_dir(),
            catalog_path: default_catalog_path(),
            cities_csv: default_cities_csv(),
            dry_run: false,
            window_secs: default_window_secs(),
            force: false,
            prune: false,
            offline: false,
            geocode_timeout_secs: default_geocode_timeout_secs(),
        }
    }
}

impl IndexOptions {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            window_secs: self.window_secs,
            dry_run: self.dry_run,
            force: self.force,
            prune: self.prune,
        }
    }
}

/// Type alias for progress callback: `(stage, current, total, message)`.
/// The callback may borrow from its caller for `'a`.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Forwards at most one update per 200ms, plus the final one of a stage.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Mutex<Option<Instant>>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(None),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        if current < total {
            let mut last = self.last_emit.lock().unwrap_or_else(|e| e.into_inner());
            if last.is_some_and(|t| t.elapsed() < Duration::from_millis(200)) {
                return;
            }
            *last = Some(Instant::now());
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Gazetteer first, then the network geocoder unless `offline`.
pub fn build_resolver(options: &IndexOptions) -> anyhow::Result<PlaceResolver> {
    let mut sources: Vec<Box<dyn PlaceSource>> = Vec::new();

    match Gazetteer::load(&options.cities_csv) {
        Ok(gazetteer) => {
            log::info!(
                "Loaded {} cities from {}",
                gazetteer.len(),
                options.cities_csv.display()
            );
            sources.push(Box::new(gazetteer));
        }
        Err(e) => log::warn!(
            "City table {} unavailable ({}); continuing without it",
            options.cities_csv.display(),
            e
        ),
    }

    if !options.offline {
        let nominatim = Nominatim::new(Duration::from_secs(options.geocode_timeout_secs))
            .context("Failed to build geocoding client")?;
        sources.push(Box::new(Geocoder::new(nominatim)));
    }

    Ok(PlaceResolver::new(sources))
}

/// Index the image directory, geotag from the track logs and save the catalog.
pub fn run(options: &IndexOptions, progress_callback: &ProgressCallback<'_>) -> anyhow::Result<RunSummary> {
    let tp = ThrottledProgress::new(progress_callback);

    let trackpoints = track::load_trackpoints(&options.gpx_dir);
    log::info!(
        "Loaded {} trackpoints from {}",
        trackpoints.len(),
        options.gpx_dir.display()
    );

    let resolver = build_resolver(options)?;
    log::debug!("Place sources: {:?}", resolver.sources().collect::<Vec<_>>());

    let catalog = Catalog::load_or_recover(&options.catalog_path)
        .with_context(|| format!("Failed to load {}", options.catalog_path.display()))?;

    let photos = photo::find_images(&options.image_dir);
    log::info!("Found {} image files in {}", photos.len(), options.image_dir.display());

    let result = reconcile(
        catalog,
        &photos,
        &trackpoints,
        &resolver,
        &options.reconcile_options(),
        &chrono::Utc::now,
        &|stage, current, total, message| tp.report(stage, current, total, message),
    );

    result
        .catalog
        .save(&options.catalog_path)
        .with_context(|| format!("Failed to write {}", options.catalog_path.display()))?;

    Ok(result.summary)
}
