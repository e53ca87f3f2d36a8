use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::storage::{BlobStore, MARKERS_KEY};

/// Map opens centered on Philadelphia.
pub const DEFAULT_CENTER: Coordinate = Coordinate { lat: 39.9526, lon: -75.1652 };
pub const DEFAULT_ZOOM: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoder answered HTTP {0}")]
    Status(u16),
    #[error("no results for address")]
    ZeroResults,
    #[error("geocoder returned unreadable coordinates {lat:?}, {lon:?}")]
    BadCoordinate { lat: String, lon: String },
}

pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError>;
}

/// Geocoder speaking the Nominatim `/search` JSON API.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder().user_agent(user_agent.to_string()).build()?;
        Ok(NominatimGeocoder { client, endpoint: endpoint.to_string() })
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let places: Vec<Place> = response.json()?;
        let place = places.into_iter().next().ok_or(GeocodeError::ZeroResults)?;
        parse_place(place)
    }
}

fn parse_place(place: Place) -> Result<Coordinate, GeocodeError> {
    match (place.lat.parse(), place.lon.parse()) {
        (Ok(lat), Ok(lon)) => Ok(Coordinate { lat, lon }),
        _ => Err(GeocodeError::BadCoordinate { lat: place.lat, lon: place.lon }),
    }
}

/// Pins keyed by address. A pin is placed once and never moved.
pub struct MarkerBoard {
    backend: Box<dyn BlobStore>,
    markers: Mutex<BTreeMap<String, Coordinate>>,
    in_flight: Mutex<BTreeSet<String>>,
}

impl MarkerBoard {
    pub fn open(backend: impl BlobStore + 'static) -> Self {
        let markers = match backend.read(MARKERS_KEY) {
            Ok(Some(blob)) => serde_json::from_str(&blob).unwrap_or_else(|e| {
                warn!("discarding unreadable map markers: {}", e);
                BTreeMap::new()
            }),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("could not read map markers: {}", e);
                BTreeMap::new()
            }
        };
        MarkerBoard {
            backend: Box::new(backend),
            markers: Mutex::new(markers),
            in_flight: Mutex::new(BTreeSet::new()),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, address: &str) -> bool {
        self.markers.lock().map(|m| m.contains_key(address)).unwrap_or(false)
    }

    /// Reserves a lookup for `address`. False when it is already pinned or
    /// another lookup for it is still running.
    pub fn claim(&self, address: &str) -> bool {
        let Ok(markers) = self.markers.lock() else {
            return false;
        };
        if markers.contains_key(address) {
            return false;
        }
        self.in_flight.lock().map(|mut f| f.insert(address.to_string())).unwrap_or(false)
    }

    pub fn release(&self, address: &str) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(address);
        }
    }

    pub fn markers(&self) -> BTreeMap<String, Coordinate> {
        self.markers.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Returns false when the address already had a marker.
    pub fn place(&self, address: &str, at: Coordinate) -> bool {
        let Ok(mut markers) = self.markers.lock() else {
            return false;
        };
        if markers.contains_key(address) {
            return false;
        }
        markers.insert(address.to_string(), at);

        let saved = serde_json::to_string(&*markers)
            .map_err(std::io::Error::other)
            .and_then(|blob| self.backend.write(MARKERS_KEY, &blob));
        if let Err(e) = saved {
            warn!("marker for {} kept in memory only: {}", address, e);
        }
        true
    }
}

/// Geocodes `address` on a background thread and pins it on success.
/// Returns `None` when the address is already pinned or being looked up.
pub fn pin_address(
    geocoder: Arc<dyn Geocoder>,
    board: Arc<MarkerBoard>,
    address: &str,
) -> Option<JoinHandle<()>> {
    if !board.claim(address) {
        debug!("{} already pinned or pending", address);
        return None;
    }
    let address = address.to_string();
    Some(thread::spawn(move || {
        match geocoder.geocode(&address) {
            Ok(at) => {
                if board.place(&address, at) {
                    debug!(lat = at.lat, lon = at.lon, "pinned {}", address);
                }
            }
            Err(e) => error!("Geocode was not successful for {}: {}", address, e),
        }
        board.release(&address);
    }))
}

/// Apple Maps directions link for an address.
pub fn directions_url(address: &str) -> String {
    Url::parse_with_params("https://maps.apple.com/", &[("daddr", address)])
        .map(String::from)
        .unwrap_or_else(|_| "https://maps.apple.com/".to_string())
}

/// OpenStreetMap view link centred on a coordinate.
pub fn map_view_url(at: Coordinate, zoom: u8) -> String {
    format!(
        "https://www.openstreetmap.org/?mlat={lat}&mlon={lon}#map={zoom}/{lat}/{lon}",
        lat = at.lat,
        lon = at.lon,
        zoom = zoom
    )
}
