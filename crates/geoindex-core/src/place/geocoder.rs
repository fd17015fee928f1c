use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;

use super::PlaceSource;
use crate::error::Result;

const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
const USER_AGENT: &str = concat!("geoindex/", env!("CARGO_PKG_VERSION"));

/// The public Nominatim usage policy allows one request per second.
pub const NOMINATIM_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Address breakdown returned by a reverse geocoder.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub hamlet: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Address {
    /// The most specific settlement name present.
    pub fn settlement(&self) -> Option<&str> {
        non_empty(&self.city)
            .or_else(|| non_empty(&self.town))
            .or_else(|| non_empty(&self.village))
            .or_else(|| non_empty(&self.hamlet))
    }

    /// `"{city}, {country}"`, or just the country, or nothing.
    pub fn place_name(&self) -> Option<String> {
        let country = non_empty(&self.country)?;
        match self.settlement() {
            Some(city) => Some(format!("{}, {}", city, country)),
            None => Some(country.to_string()),
        }
    }
}

/// Remote reverse-geocoding backend.
pub trait AddressLookup {
    fn reverse(&self, lat: f64, lon: f64) -> Result<Address>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Address,
}

/// Blocks callers so that successive requests start at least
/// `min_interval` apart.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    pub fn wait(&self) {
        let mut last = self.last_start.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let pause = self.min_interval - elapsed;
                log::trace!("Pacing geocoder request by {:?}", pause);
                thread::sleep(pause);
            }
        }
        *last = Some(Instant::now());
    }
}

/// OpenStreetMap Nominatim reverse geocoder (blocking, bounded by a timeout,
/// at most one request per [`NOMINATIM_MIN_INTERVAL`]).
pub struct Nominatim {
    client: reqwest::blocking::Client,
    endpoint: String,
    pacer: RequestPacer,
}

impl Nominatim {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoint(NOMINATIM_REVERSE_URL, timeout)
    }

    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            pacer: RequestPacer::new(NOMINATIM_MIN_INTERVAL),
        })
    }
}

impl AddressLookup for Nominatim {
    fn reverse(&self, lat: f64, lon: f64) -> Result<Address> {
        let lat = lat.to_string();
        let lon = lon.to_string();
        self.pacer.wait();
        let response: ReverseResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "jsonv2"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("addressdetails", "1"),
                ("accept-language", "en"),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.address)
    }
}

/// Place source backed by a reverse geocoder. Lookup failures defer.
pub struct Geocoder<L> {
    lookup: L,
}

impl<L: AddressLookup> Geocoder<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }
}

impl<L: AddressLookup> PlaceSource for Geocoder<L> {
    fn name(&self) -> &str {
        "geocoder"
    }

    fn lookup(&self, lat: f64, lon: f64) -> Option<String> {
        match self.lookup.reverse(lat, lon) {
            Ok(address) => address.place_name(),
            Err(e) => {
                log::warn!("Reverse geocoding failed for ({},{}): {}", lat, lon, e);
                None
            }
        }
    }
}
