// src/services/directions.rs
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{TrackingError, TrackingResult};
use crate::models::Coordinates;

/// Raw result of one directions computation. The session turns this into a
/// `RouteSnapshot` so geometry and ETA stay from the same response.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsResult {
    pub geometry: Vec<Coordinates>,
    pub duration_seconds: f64,
}

/// External directions function: driving route from the driver position to
/// the current target. May fail; the caller treats failure as "no update".
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn route(&self, origin: Coordinates, destination: Coordinates)
    -> TrackingResult<DirectionsResult>;
}

/// Directions over an OSRM-compatible routing endpoint.
pub struct HttpDirectionsService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectionsService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: [lng, lat].
    coordinates: Vec<[f64; 2]>,
}

#[async_trait]
impl DirectionsProvider for HttpDirectionsService {
    async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> TrackingResult<DirectionsResult> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, origin.lng, origin.lat, destination.lng, destination.lat
        );
        debug!(%url, "requesting directions");

        let response: OsrmResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| TrackingError::Directions(e.to_string()))?
            .json()
            .await?;

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| TrackingError::Directions("no route returned".to_string()))?;

        Ok(DirectionsResult {
            geometry: route
                .geometry
                .coordinates
                .into_iter()
                .map(|[lng, lat]| Coordinates::new(lat, lng))
                .collect(),
            duration_seconds: route.duration,
        })
    }
}

/// Offline stand-in: straight-line geometry with a haversine distance and a
/// conservative urban average speed. Used by the demo and wherever a
/// routing backend is not configured.
pub struct EstimatingDirections {
    average_speed_kmh: f64,
}

impl EstimatingDirections {
    pub fn new() -> Self {
        Self {
            average_speed_kmh: 30.0,
        }
    }
}

impl Default for EstimatingDirections {
    fn default() -> Self {
        Self::new()
    }
}

pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let earth_radius_km = 6371.0;
    let lat1_rad = a.lat.to_radians();
    let lat2_rad = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    earth_radius_km * c
}

#[async_trait]
impl DirectionsProvider for EstimatingDirections {
    async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> TrackingResult<DirectionsResult> {
        let distance_km = haversine_km(origin, destination);
        Ok(DirectionsResult {
            geometry: vec![origin, destination],
            duration_seconds: distance_km / self.average_speed_kmh * 3600.0,
        })
    }
}
