// src/models/service.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a roadside-assistance service request.
///
/// The server is authoritative; the client never advances this locally.
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Pending,      // Created, waiting for a driver to accept
    Accepted,     // Driver accepted, heading to the client
    DriverOnSite, // Driver arrived at the origin point
    Loading,      // Vehicle being loaded onto the tow truck
    InProgress,   // En route to the destination
    Completed,    // Service finished
    Cancelled,    // Cancelled by either party
}

impl ServiceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Completed | ServiceState::Cancelled)
    }

    /// Active means the driver is still working the request.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Ordinal position in the normal forward progression. `Cancelled` is
    /// reachable from any non-terminal state, so it shares the top rank.
    pub fn rank(&self) -> u8 {
        match self {
            ServiceState::Pending => 0,
            ServiceState::Accepted => 1,
            ServiceState::DriverOnSite => 2,
            ServiceState::Loading => 3,
            ServiceState::InProgress => 4,
            ServiceState::Completed => 5,
            ServiceState::Cancelled => 5,
        }
    }

    /// User-facing status text for the tracking header.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Pending => "Searching for a driver...",
            ServiceState::Accepted => "Driver on the way",
            ServiceState::DriverOnSite => "Driver at the pickup point",
            ServiceState::Loading => "Loading your vehicle",
            ServiceState::InProgress => "En route to destination",
            ServiceState::Completed => "Service completed",
            ServiceState::Cancelled => "Service cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Insurance,
}

impl PaymentMethod {
    /// Cash services need an explicit payment confirmation before rating.
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

/// Secondary price-agreement track, independent of the service lifecycle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    NotApplicable,
    PendingEvaluation,
    Proposed,
    Confirmed,
    Accepted,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Driver display data carried on the service record; used by the tracking
/// card and the rating prompt.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub average_rating: Option<f32>,
}

impl DriverSummary {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One service request (trip), as returned by the snapshot endpoint and as
/// carried whole on `service_status_change` messages.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Service {
    pub id: String,
    pub client_id: String,
    pub driver: Option<DriverSummary>,
    pub state: ServiceState,
    pub payment_method: PaymentMethod,

    pub origin: Coordinates,
    pub destination: Coordinates,
    /// Attachable only while `InProgress`; once present it permanently
    /// supersedes `destination` as the routing target.
    pub extended_destination: Option<Coordinates>,

    pub requires_negotiation: bool,
    pub negotiation_state: Option<NegotiationState>,
    pub negotiated_amount: Option<f64>,
    pub total_cost: f64,
    pub distance_km: f64,

    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A submitted rating; at most one exists per service. Its presence is the
/// authoritative signal that the post-trip rating step already happened.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Rating {
    pub id: String,
    pub service_id: String,
    pub stars: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
