// src/main.rs
//
// Demo harness: drives one simulated tow service from pending to completed
// through the tracking session, with estimated directions and
// auto-confirming prompts. Useful for watching the orchestration logs.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use towline_tracking::errors::TrackingResult;
use towline_tracking::models::{
    Coordinates, DriverLocationUpdate, DriverSummary, DriverTelemetry, InboundMessage,
    OutboundMessage, PaymentMethod, Rating, Service, ServiceState, ServiceStatusChange,
    SessionRole,
};
use towline_tracking::services::api_service::ServiceApi;
use towline_tracking::services::channel::RealtimeChannel;
use towline_tracking::services::directions::EstimatingDirections;
use towline_tracking::services::workflow::AutoPrompts;
use towline_tracking::{SessionConfig, TrackingSession};

/// Serves the scripted service record; no rating exists yet, so the
/// completion workflow runs at the end of the trip.
struct DemoApi {
    service: Mutex<Service>,
}

#[async_trait]
impl ServiceApi for DemoApi {
    async fn fetch_service(&self, _service_id: &str) -> TrackingResult<Option<Service>> {
        Ok(Some(self.service.lock().unwrap().clone()))
    }

    async fn fetch_rating(&self, _service_id: &str) -> TrackingResult<Option<Rating>> {
        Ok(None)
    }
}

/// Replays a prepared message script with a fixed tick between messages.
struct ScriptedChannel {
    script: VecDeque<InboundMessage>,
    tick: Duration,
}

#[async_trait]
impl RealtimeChannel for ScriptedChannel {
    async fn join(&mut self, service_id: &str, role: SessionRole) -> TrackingResult<()> {
        let join = OutboundMessage::JoinService {
            service_id: service_id.to_string(),
            role,
        };
        info!(message = %serde_json::to_string(&join)?, "joined realtime channel");
        Ok(())
    }

    fn messages(&mut self) -> BoxStream<'_, InboundMessage> {
        let tick = self.tick;
        Box::pin(futures::stream::unfold(
            &mut self.script,
            move |script| async move {
                let message = script.pop_front()?;
                tokio::time::sleep(tick).await;
                Some((message, script))
            },
        ))
    }
}

fn telemetry_at(service_id: &str, position: Coordinates) -> InboundMessage {
    let mut rng = rand::rng();
    InboundMessage::DriverLocationUpdate(DriverLocationUpdate {
        service_id: service_id.to_string(),
        telemetry: DriverTelemetry {
            position: Coordinates::new(
                position.lat + rng.random_range(-0.0005..0.0005),
                position.lng + rng.random_range(-0.0005..0.0005),
            ),
            speed_kmh: Some(rng.random_range(20.0..55.0)),
            heading_degrees: Some(rng.random_range(0.0..360.0)),
            timestamp_ms: Utc::now().timestamp_millis(),
            status_message: None,
            distance_remaining_m: None,
        },
    })
}

fn at_state(base: &Service, state: ServiceState) -> InboundMessage {
    let mut service = base.clone();
    service.state = state;
    InboundMessage::ServiceStatusChange(ServiceStatusChange { service })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let service_id = Uuid::new_v4().to_string();
    let origin = Coordinates::new(18.4861, -69.9312);
    let destination = Coordinates::new(18.5001, -69.8512);

    let service = Service {
        id: service_id.clone(),
        client_id: Uuid::new_v4().to_string(),
        driver: Some(DriverSummary {
            id: Uuid::new_v4().to_string(),
            first_name: "Juan".to_string(),
            last_name: "Perez".to_string(),
            average_rating: Some(4.8),
        }),
        state: ServiceState::Pending,
        payment_method: PaymentMethod::Cash,
        origin,
        destination,
        extended_destination: None,
        requires_negotiation: false,
        negotiation_state: None,
        negotiated_amount: None,
        total_cost: 2450.0,
        distance_km: 9.3,
        created_at: Utc::now(),
        accepted_at: None,
        started_at: None,
        completed_at: None,
        cancelled_at: None,
    };

    let mut with_extended = service.clone();
    with_extended.state = ServiceState::InProgress;
    with_extended.extended_destination = Some(Coordinates::new(18.5204, -69.8404));

    let script = VecDeque::from(vec![
        at_state(&service, ServiceState::Accepted),
        telemetry_at(&service_id, Coordinates::new(18.4700, -69.9100)),
        telemetry_at(&service_id, Coordinates::new(18.4790, -69.9205)),
        at_state(&service, ServiceState::DriverOnSite),
        at_state(&service, ServiceState::Loading),
        at_state(&service, ServiceState::InProgress),
        telemetry_at(&service_id, Coordinates::new(18.4920, -69.8900)),
        InboundMessage::ServiceStatusChange(ServiceStatusChange {
            service: with_extended.clone(),
        }),
        telemetry_at(&service_id, Coordinates::new(18.5100, -69.8600)),
        at_state(&with_extended, ServiceState::Completed),
    ]);

    let mut session = TrackingSession::new(
        service_id,
        SessionConfig::default(),
        Arc::new(EstimatingDirections::new()),
        Arc::new(DemoApi {
            service: Mutex::new(service),
        }),
        Arc::new(AutoPrompts),
    );

    session.mount().await?;

    let mut channel = ScriptedChannel {
        script,
        tick: Duration::from_millis(200),
    };
    session.run(&mut channel).await?;

    if let Some(state) = session.state() {
        info!(state = state.label(), "trip finished");
    }
    if let Some(route) = session.route() {
        info!(
            eta_minutes = route.eta_minutes,
            points = route.geometry.len(),
            "last computed route"
        );
    }

    Ok(())
}
