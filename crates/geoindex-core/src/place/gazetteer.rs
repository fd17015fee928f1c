use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::{haversine_km, PlaceSource};
use crate::error::Result;

/// Cities further than this from the query point are not used as its name.
pub const MAX_CITY_DISTANCE_KM: f64 = 25.0;

/// One gazetteer row. Extra CSV columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct City {
    pub city: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
}

/// In-memory world cities table for offline place lookup.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    cities: Vec<City>,
}

impl Gazetteer {
    pub fn new(cities: Vec<City>) -> Self {
        Self { cities }
    }

    /// Load a `city,country,lat,lng` CSV (SimpleMaps worldcities layout).
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        // Validate the header row up front so a wrong file fails loudly.
        csv_reader.headers()?;

        let mut cities = Vec::new();
        let mut skipped = 0usize;
        for row in csv_reader.deserialize::<City>() {
            match row {
                Ok(city) => cities.push(city),
                Err(e) => {
                    skipped += 1;
                    log::trace!("Skipping gazetteer row: {}", e);
                }
            }
        }
        if skipped > 0 {
            log::debug!("Skipped {} malformed gazetteer rows", skipped);
        }
        Ok(Self::new(cities))
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Nearest city by planar distance in degree space; first row wins ties.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<&City> {
        let mut best: Option<(&City, f64)> = None;
        for city in &self.cities {
            let d = (city.lat - lat).hypot(city.lng - lon);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((city, d));
            }
        }
        best.map(|(city, _)| city)
    }
}

impl PlaceSource for Gazetteer {
    fn name(&self) -> &str {
        "gazetteer"
    }

    fn lookup(&self, lat: f64, lon: f64) -> Option<String> {
        let city = self.nearest(lat, lon)?;
        let km = haversine_km(lat, lon, city.lat, city.lng);
        if km < MAX_CITY_DISTANCE_KM {
            Some(format!("{}, {}", city.city, city.country))
        } else {
            log::trace!("Nearest city {} is {:.1} km away", city.city, km);
            None
        }
    }
}
