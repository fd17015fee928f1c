use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::catalog::{sort_for_display, Catalog, CatalogEntry};
use crate::date::{self, format_day, parse_iso8601, to_iso8601};
use crate::matcher::{match_trackpoint, TrackMatch};
use crate::photo::{read_photo, PhotoMetadata};
use crate::place::PlaceResolver;
use crate::report::{closest_after_line, closest_before_line, PhotoReport, RunSummary};
use crate::track::Trackpoint;
use crate::writer::write_geotag;
use crate::ProgressCallback;

/// Knobs for one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOptions {
    /// A track fix must be strictly closer than this to tag a photo.
    pub window_secs: i64,
    /// Report geotag writes without touching any image file.
    pub dry_run: bool,
    /// Refresh derived fields even when already set.
    pub force: bool,
    /// Move entries for files no longer on disk to the pruned list.
    pub prune: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            window_secs: 3600,
            dry_run: false,
            force: false,
            prune: false,
        }
    }
}

pub struct Reconciliation {
    pub catalog: Catalog,
    pub summary: RunSummary,
}

/// Clock used for the `added` field.
pub type Clock<'a> = dyn Fn() -> DateTime<Utc> + 'a;

struct Reconciler<'a> {
    trackpoints: &'a [Trackpoint],
    resolver: &'a PlaceResolver,
    options: ReconcileOptions,
    now: &'a Clock<'a>,
    summary: RunSummary,
}

/// Merge what is on disk into `catalog` and geotag photos from `trackpoints`.
///
/// `photos` are catalog paths (as produced by [`crate::photo::find_images`]);
/// they are opened relative to the working directory. The returned catalog
/// is sorted for display and ready to save.
pub fn reconcile(
    catalog: Catalog,
    photos: &[String],
    trackpoints: &[Trackpoint],
    resolver: &PlaceResolver,
    options: &ReconcileOptions,
    now: &Clock<'_>,
    progress: &ProgressCallback<'_>,
) -> Reconciliation {
    let Catalog { images, pruned } = catalog;
    let mut entries: IndexMap<String, CatalogEntry> = images
        .into_iter()
        .map(|e| (e.path.clone(), e))
        .collect();
    let mut pruned: Vec<CatalogEntry> = pruned;

    let mut r = Reconciler {
        trackpoints,
        resolver,
        options: *options,
        now,
        summary: RunSummary {
            total_files: photos.len(),
            ..RunSummary::default()
        },
    };

    let total = photos.len() as u64;
    let mut seen: HashSet<&str> = HashSet::with_capacity(photos.len());
    for (i, path) in photos.iter().enumerate() {
        progress("reconcile", i as u64, total, path.as_str());
        seen.insert(path.as_str());

        let entry = match entries.get(path) {
            Some(existing) => existing.clone(),
            None => match pruned.iter().position(|e| &e.path == path) {
                Some(idx) => {
                    r.summary
                        .details
                        .push(format!("Restored pruned metadata for reappeared image: {}", path));
                    pruned.remove(idx)
                }
                None => CatalogEntry::new(path.as_str()),
            },
        };

        let meta = read_photo(Path::new(path));
        let (entry, report) = r.process(entry, &meta);
        entries.insert(path.clone(), entry);
        r.summary.photos.push(report);
    }
    progress("reconcile", total, total, "done");

    let mut live = Vec::with_capacity(entries.len());
    for (path, entry) in entries {
        if r.options.prune && !seen.contains(path.as_str()) {
            r.summary
                .details
                .push(format!("Pruned metadata for missing image: {}", path));
            r.summary.pruned += 1;
            pruned.push(entry);
        } else {
            live.push(entry);
        }
    }

    let mut summary = r.summary;
    // Newest first, photos without a time at the end.
    summary.photos.sort_by(|a, b| b.time.cmp(&a.time));

    Reconciliation {
        catalog: Catalog {
            images: sort_for_display(live),
            pruned,
        },
        summary,
    }
}

impl Reconciler<'_> {
    fn process(&mut self, mut entry: CatalogEntry, meta: &PhotoMetadata) -> (CatalogEntry, PhotoReport) {
        let path = entry.path.clone();
        if let Some(err) = &meta.error {
            log::warn!("Could not read metadata for {}: {}", path, err);
            self.summary.skipped += 1;
            self.summary.errors.push(format!("{}: {}", path, err));
        }

        self.reconcile_fields(&mut entry, meta);

        let photo_time = parse_iso8601(&entry.taken);
        let mut lines = Vec::new();
        match photo_time {
            Some(time) if meta.error.is_none() => {
                self.geotag(&mut entry, meta, time, &mut lines);
            }
            _ => lines.push(format!("MISSING TIMESTAMP: {}", path)),
        }

        if let Some(headline) = lines.first() {
            self.summary.details.push(headline.clone());
        }
        let report = PhotoReport {
            path,
            time: photo_time,
            lines,
        };
        (entry, report)
    }

    /// Fill derived fields that are empty, or all of them under `force`.
    fn reconcile_fields(&mut self, entry: &mut CatalogEntry, meta: &PhotoMetadata) {
        let force = self.options.force;
        let path = entry.path.clone();

        if force || entry.width.is_none() || entry.height.is_none() {
            if let (Some(w), Some(h)) = (meta.width, meta.height) {
                entry.width = Some(w);
                entry.height = Some(h);
                self.summary.updated_size += 1;
                self.summary
                    .details
                    .push(format!("Set width/height for {} to {}x{}", path, w, h));
            }
        }

        if force || !entry.has_taken() {
            let iso = meta
                .capture_time
                .as_deref()
                .map(date::exif::exif_to_iso8601)
                .unwrap_or_default();
            if !iso.is_empty() {
                self.summary.updated_taken += 1;
                self.summary
                    .details
                    .push(format!("Set date taken for {} to {}", path, iso));
                entry.taken = iso;
            }
        }

        if entry.added.trim().is_empty() {
            entry.added = to_iso8601((self.now)());
            self.summary.added += 1;
            self.summary.details.push(format!("Added new image: {}", path));
        }

        if force || entry.location.trim().is_empty() {
            if let Some(gps) = meta.gps {
                let place = self.resolver.resolve(gps.latitude, gps.longitude);
                self.set_location(entry, place);
            }
        }
    }

    fn set_location(&mut self, entry: &mut CatalogEntry, place: String) {
        self.summary.updated_location += 1;
        self.summary
            .details
            .push(format!("Set location for {} to {}", entry.path, place));
        entry.location = place;
    }

    /// Decide and report the geotag outcome for a photo with a known time.
    fn geotag(
        &mut self,
        entry: &mut CatalogEntry,
        meta: &PhotoMetadata,
        photo_time: DateTime<Utc>,
        lines: &mut Vec<String>,
    ) {
        let path = entry.path.clone();
        let m = match_trackpoint(photo_time, self.trackpoints, self.options.window_secs);

        if let Some(gps) = meta.gps {
            lines.push(format!("SKIP (already geotagged): {}", path));
            lines.push(format!(
                "  Photo geotag: {}",
                self.resolver.resolve(gps.latitude, gps.longitude)
            ));
            self.bracket(photo_time, &m, lines, true);
            return;
        }

        let Some(best) = m.best else {
            lines.push(format!("NO MATCH: {}", path));
            lines.push(format!("  Photo Time: {}", format_day(photo_time)));
            self.bracket(photo_time, &m, lines, true);
            return;
        };

        let place = self.resolver.resolve(best.latitude, best.longitude);
        let action = if self.options.dry_run { "WOULD UPDATE" } else { "UPDATED" };
        lines.push(format!(
            "{}: {} -> {} at {}",
            action,
            path,
            place,
            format_day(best.time)
        ));

        if !self.options.dry_run {
            match write_geotag(Path::new(&path), best.latitude, best.longitude) {
                Ok(()) => {
                    self.summary.geotag_updated += 1;
                    if entry.location.trim().is_empty() {
                        self.set_location(entry, place);
                    }
                }
                Err(e) => {
                    log::warn!("Geotag write failed for {}: {}", path, e);
                    lines.push(format!("Error updating {}: {}", path, e));
                    self.summary.errors.push(format!("{}: {}", path, e));
                }
            }
        }

        self.bracket(photo_time, &m, lines, false);
    }

    /// Append the closest before/after fixes. With `always` unset, a side that
    /// is the chosen fix itself, or missing, is left out.
    fn bracket(&self, photo_time: DateTime<Utc>, m: &TrackMatch<'_>, lines: &mut Vec<String>, always: bool) {
        match m.before {
            Some(before) if always || m.best != Some(before) => {
                lines.push(closest_before_line(photo_time, before, self.resolver));
            }
            None if always => lines.push("  No GPX point before photo.".to_string()),
            _ => {}
        }
        match m.after {
            Some(after) if always || m.best != Some(after) => {
                lines.push(closest_after_line(photo_time, after, m.before, self.resolver));
            }
            None if always => lines.push("  No GPX point after photo.".to_string()),
            _ => {}
        }
    }
}
