// src/session/telemetry_store.rs
use crate::models::{Coordinates, DriverTelemetry, Service, ServiceState};

/// Holds the latest driver telemetry for the tracked service. Updates
/// replace the whole value; there is no field-by-field merge and no
/// timestamp-based dedup (arrival order wins).
#[derive(Debug, Default)]
pub struct TelemetryStore {
    latest: Option<DriverTelemetry>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: DriverTelemetry) {
        self.latest = Some(update);
    }

    /// Reset to absent; used when the tracking session ends or re-targets.
    pub fn clear(&mut self) {
        self.latest = None;
    }

    pub fn latest(&self) -> Option<&DriverTelemetry> {
        self.latest.as_ref()
    }

    pub fn position(&self) -> Option<Coordinates> {
        self.latest.as_ref().map(|t| t.position)
    }
}

/// The single place routing-target selection is decided.
///
/// While `InProgress` the driver is heading to the drop-off: the extended
/// destination once attached, otherwise the original destination. In every
/// earlier active state the driver is still travelling to the client, so
/// the target is the origin. Terminal states have no routing target.
pub fn current_target(service: &Service) -> Option<Coordinates> {
    match service.state {
        ServiceState::InProgress => {
            Some(service.extended_destination.unwrap_or(service.destination))
        }
        state if state.is_active() => Some(service.origin),
        _ => None,
    }
}
