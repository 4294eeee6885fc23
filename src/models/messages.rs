// src/models/messages.rs
use serde::{Deserialize, Serialize};

use crate::models::service::Service;
use crate::models::telemetry::DriverTelemetry;

/// Who joined the realtime channel for a service.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Client,
    Driver,
}

/// Messages pushed by the server over the realtime channel, as a tagged
/// union so the router can match exhaustively.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundMessage {
    DriverLocationUpdate(DriverLocationUpdate),
    ServiceStatusChange(ServiceStatusChange),
}

impl InboundMessage {
    /// Trip the message belongs to; used to discard foreign-trip traffic.
    pub fn service_id(&self) -> &str {
        match self {
            InboundMessage::DriverLocationUpdate(update) => &update.service_id,
            InboundMessage::ServiceStatusChange(change) => &change.service.id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverLocationUpdate {
    pub service_id: String,
    #[serde(flatten)]
    pub telemetry: DriverTelemetry,
}

/// Carries the full updated service record; the cached copy is replaced
/// wholesale, never field-merged.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceStatusChange {
    pub service: Service,
}

/// Messages the client sends over the channel.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundMessage {
    JoinService { service_id: String, role: SessionRole },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::service::Coordinates;

    #[test]
    fn location_update_envelope_round_trips() {
        let raw = serde_json::json!({
            "type": "driver_location_update",
            "payload": {
                "service_id": "svc-1",
                "position": { "lat": 18.47, "lng": -69.90 },
                "speed_kmh": 42.0,
                "heading_degrees": 180.0,
                "timestamp_ms": 1_700_000_000_000i64,
                "status_message": "5 minutes away",
                "distance_remaining_m": 2300.0
            }
        });

        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        match &msg {
            InboundMessage::DriverLocationUpdate(update) => {
                assert_eq!(update.service_id, "svc-1");
                assert_eq!(update.telemetry.position, Coordinates::new(18.47, -69.90));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(msg.service_id(), "svc-1");
    }

    #[test]
    fn join_message_envelope() {
        let msg = OutboundMessage::JoinService {
            service_id: "svc-9".to_string(),
            role: SessionRole::Client,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "join_service");
        assert_eq!(value["payload"]["service_id"], "svc-9");
        assert_eq!(value["payload"]["role"], "client");
    }
}
