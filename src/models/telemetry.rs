// src/models/telemetry.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::service::Coordinates;

/// Latest known driver position and derived motion fields for one trip.
///
/// Replaced wholesale on every update; fields are never merged from an
/// older report. `timestamp_ms` is display-only, arrivals are applied in
/// order received.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DriverTelemetry {
    pub position: Coordinates,
    pub speed_kmh: Option<f64>,
    pub heading_degrees: Option<f64>,
    pub timestamp_ms: i64,
    pub status_message: Option<String>,
    pub distance_remaining_m: Option<f64>,
}

/// Derived route view: polyline from the driver to the current target plus
/// the ETA computed from the same directions response. Built and applied as
/// one unit so the displayed route and ETA always come from the same slice
/// of time.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSnapshot {
    pub geometry: Vec<Coordinates>,
    pub eta_minutes: u32,
    pub arrival_time: DateTime<Utc>,
}

impl RouteSnapshot {
    /// Derive a snapshot from a directions duration, anchored at `now`.
    pub fn from_directions(geometry: Vec<Coordinates>, duration_seconds: f64, now: DateTime<Utc>) -> Self {
        let secs = duration_seconds.max(0.0);
        let eta_minutes = (secs / 60.0).ceil() as u32;
        Self {
            geometry,
            eta_minutes,
            arrival_time: now + chrono::Duration::seconds(secs as i64),
        }
    }
}
