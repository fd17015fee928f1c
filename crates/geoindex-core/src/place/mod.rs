pub mod gazetteer;
pub mod geocoder;

use std::cell::RefCell;
use std::collections::HashMap;

pub use gazetteer::{City, Gazetteer};
pub use geocoder::{Address, AddressLookup, Geocoder, Nominatim};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// A way of naming a coordinate. Returning `None` defers to the next source.
pub trait PlaceSource {
    fn name(&self) -> &str;
    fn lookup(&self, lat: f64, lon: f64) -> Option<String>;
}

/// Last resort when no source can name a coordinate.
pub fn unknown_place(lat: f64, lon: f64) -> String {
    format!("Unknown City/Country ({:.5},{:.5})", lat, lon)
}

/// Ordered chain of place sources, first answer wins.
///
/// Answers are memoized per coordinate (to 1e-5 degree) for the lifetime of
/// the resolver, so repeated lookups of the same fix never hit the network twice.
pub struct PlaceResolver {
    sources: Vec<Box<dyn PlaceSource>>,
    cache: RefCell<HashMap<(i64, i64), String>>,
}

impl PlaceResolver {
    pub fn new(sources: Vec<Box<dyn PlaceSource>>) -> Self {
        Self {
            sources,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name())
    }

    /// Name the place at `(lat, lon)`. Never returns an empty string.
    pub fn resolve(&self, lat: f64, lon: f64) -> String {
        let key = ((lat * 1e5).round() as i64, (lon * 1e5).round() as i64);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }

        let name = self
            .sources
            .iter()
            .find_map(|source| {
                let found = source.lookup(lat, lon);
                if let Some(ref place) = found {
                    log::debug!("({:.5},{:.5}) -> {} via {}", lat, lon, place, source.name());
                }
                found
            })
            .filter(|place| !place.is_empty())
            .unwrap_or_else(|| unknown_place(lat, lon));

        self.cache.borrow_mut().insert(key, name.clone());
        name
    }
}
