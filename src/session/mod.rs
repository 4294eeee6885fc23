// src/session/mod.rs
//
// Per-trip tracking session: the single entry point for inbound realtime
// messages and REST snapshots. Owns every piece of mutable tracking state
// (cached service, telemetry, route planner, completion sequencer), so all
// of it is mutated from one task and handlers run to completion in arrival
// order. Nothing here is shared or locked.
pub mod completion;
pub mod negotiation;
pub mod route;
pub mod state_machine;
pub mod telemetry_store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{TrackingError, TrackingResult};
use crate::models::{
    DriverLocationUpdate, DriverTelemetry, InboundMessage, RouteSnapshot, Service, ServiceState,
    SessionRole,
};
use crate::services::api_service::ServiceApi;
use crate::services::channel::RealtimeChannel;
use crate::services::directions::DirectionsProvider;
use crate::services::workflow::CompletionPrompts;

use completion::{CompletionSequencer, LaunchDecision};
use route::{DEFAULT_ROUTE_REFRESH_INTERVAL, RoutePlanner};
use state_machine::StateDecision;
use telemetry_store::TelemetryStore;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub role: SessionRole,
    pub route_refresh_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: SessionRole::Client,
            route_refresh_interval: DEFAULT_ROUTE_REFRESH_INTERVAL,
        }
    }
}

pub struct TrackingSession {
    service_id: String,
    config: SessionConfig,
    service: Option<Service>,
    telemetry: TelemetryStore,
    route: RoutePlanner,
    completion: CompletionSequencer,
    directions: Arc<dyn DirectionsProvider>,
    api: Arc<dyn ServiceApi>,
    prompts: Arc<dyn CompletionPrompts>,
    workflow: Option<JoinHandle<()>>,
}

impl TrackingSession {
    pub fn new(
        service_id: impl Into<String>,
        config: SessionConfig,
        directions: Arc<dyn DirectionsProvider>,
        api: Arc<dyn ServiceApi>,
        prompts: Arc<dyn CompletionPrompts>,
    ) -> Self {
        let route = RoutePlanner::new(config.route_refresh_interval);
        Self {
            service_id: service_id.into(),
            config,
            service: None,
            telemetry: TelemetryStore::new(),
            route,
            completion: CompletionSequencer::new(),
            directions,
            api,
            prompts,
            workflow: None,
        }
    }

    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    pub fn state(&self) -> Option<ServiceState> {
        self.service.as_ref().map(|s| s.state)
    }

    pub fn telemetry(&self) -> Option<&DriverTelemetry> {
        self.telemetry.latest()
    }

    pub fn route(&self) -> Option<&RouteSnapshot> {
        self.route.snapshot()
    }

    pub fn flow_launched(&self) -> bool {
        self.completion.flow_launched()
    }

    /// Initial snapshot fetch at session start. Supports resuming after a
    /// reload: an already-completed trip goes through the same completion
    /// path as a live push would.
    pub async fn mount(&mut self) -> TrackingResult<()> {
        info!(service_id = %self.service_id, "mounting tracking session");
        let service = self
            .api
            .fetch_service(&self.service_id)
            .await?
            .ok_or_else(|| TrackingError::ServiceNotFound(self.service_id.clone()))?;
        self.apply_service(service).await;
        Ok(())
    }

    /// Single dispatch point for the realtime channel.
    pub async fn handle_message(&mut self, message: InboundMessage) {
        if message.service_id() != self.service_id {
            debug!(
                got = %message.service_id(),
                tracked = %self.service_id,
                "discarding message for foreign service"
            );
            return;
        }
        match message {
            InboundMessage::DriverLocationUpdate(update) => self.handle_location(update).await,
            InboundMessage::ServiceStatusChange(change) => self.apply_service(change.service).await,
        }
    }

    async fn handle_location(&mut self, update: DriverLocationUpdate) {
        debug!(
            service_id = %update.service_id,
            lat = update.telemetry.position.lat,
            lng = update.telemetry.position.lng,
            "driver location update"
        );
        self.telemetry.apply(update.telemetry);
        self.recompute_route(false).await;
    }

    /// Apply a full service record (mount snapshot or status-change push).
    /// The cached copy is replaced wholesale.
    async fn apply_service(&mut self, incoming: Service) {
        let prev_state = self.service.as_ref().map(|s| s.state);
        let prev_extended = self.service.as_ref().and_then(|s| s.extended_destination);

        let decision = state_machine::apply_state_event(prev_state, incoming.state);
        if decision == StateDecision::RejectedTerminal {
            return;
        }

        let extended_appeared =
            prev_extended.is_none() && incoming.extended_destination.is_some();
        if extended_appeared && incoming.state != ServiceState::InProgress {
            warn!(
                service_id = %incoming.id,
                state = ?incoming.state,
                "extended destination attached outside in_progress"
            );
        }

        let state = incoming.state;
        self.service = Some(incoming);

        let entered = matches!(decision, StateDecision::Entered(_));
        if entered {
            info!(service_id = %self.service_id, state = state.label(), "service state entered");
        }

        // Exactly two force triggers exist: entering in_progress and the
        // first attachment of the extended destination. One dispatch even
        // when both arrive on the same message.
        let force = (entered && state == ServiceState::InProgress) || extended_appeared;
        if force {
            self.recompute_route(true).await;
        }

        if state == ServiceState::Completed {
            self.check_completion().await;
        }
    }

    /// Throttled route/ETA recomputation. Failures are logged and the
    /// previous snapshot retained; a stale route never blocks tracking.
    async fn recompute_route(&mut self, force: bool) {
        let Some(service) = &self.service else {
            return;
        };
        let Some(target) = telemetry_store::current_target(service) else {
            debug!(service_id = %self.service_id, "no routing target, skipping recompute");
            return;
        };
        // Before the first telemetry fix the driver is taken to be at the
        // origin, so a force trigger always produces a route.
        let start = self.telemetry.position().unwrap_or(service.origin);

        let now = Instant::now();
        if !self.route.should_dispatch(now, force) {
            debug!(service_id = %self.service_id, "route recompute throttled");
            return;
        }
        self.route.mark_dispatched(now);

        match self.directions.route(start, target).await {
            Ok(result) => {
                let snapshot =
                    RouteSnapshot::from_directions(result.geometry, result.duration_seconds, Utc::now());
                debug!(
                    service_id = %self.service_id,
                    eta_minutes = snapshot.eta_minutes,
                    "route updated"
                );
                self.route.apply(snapshot);
            }
            Err(err) => {
                warn!(
                    service_id = %self.service_id,
                    error = %err,
                    "route recomputation failed, keeping previous route"
                );
            }
        }
    }

    /// Potential-completion convergence point, reached from both signal
    /// sources. Runs the gated rating-existence check first, then lets the
    /// sequencer's flag decide.
    async fn check_completion(&mut self) {
        if !self.completion.rating_check_resolved() && !self.completion.flow_launched() {
            match self.api.fetch_rating(&self.service_id).await {
                Ok(rating) => self.completion.record_rating_check(rating),
                Err(err) => {
                    // Never launch while the check is unresolved; the next
                    // completion signal retries it.
                    warn!(
                        service_id = %self.service_id,
                        error = %err,
                        "rating check failed, deferring completion workflow"
                    );
                    return;
                }
            }
        }

        let Some(service) = &self.service else {
            return;
        };
        match self.completion.try_launch(service.state) {
            LaunchDecision::Launch => {
                let prompts = Arc::clone(&self.prompts);
                let service_id = self.service_id.clone();
                let payment_method = service.payment_method;
                let amount = negotiation::display_total(service);
                let driver_name = service.driver.as_ref().map(|d| d.display_name());
                // Spawned because both prompts block on user interaction;
                // tracking keeps consuming events meanwhile.
                self.workflow = Some(tokio::spawn(completion::run_completion_workflow(
                    prompts,
                    service_id,
                    payment_method,
                    amount,
                    driver_name,
                )));
            }
            decision => {
                debug!(service_id = %self.service_id, ?decision, "completion workflow not launched");
            }
        }
    }

    /// Wait for a launched completion workflow to finish.
    pub async fn wait_for_workflow(&mut self) {
        if let Some(handle) = self.workflow.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "completion workflow task failed");
            }
        }
    }

    /// Re-target the session at a different service: resets telemetry, the
    /// route planner (throttle timestamp included), the completion flag and
    /// the cached trip. Tracking the same id again is a no-op.
    pub fn switch_to(&mut self, service_id: impl Into<String>) {
        let service_id = service_id.into();
        if service_id == self.service_id {
            return;
        }
        info!(from = %self.service_id, to = %service_id, "re-targeting tracking session");
        if let Some(handle) = self.workflow.take() {
            handle.abort();
        }
        self.service_id = service_id;
        self.service = None;
        self.telemetry.clear();
        self.route.reset();
        self.completion.reset();
    }

    /// Drive the session from a realtime channel until its stream ends,
    /// then wait out any launched completion workflow.
    pub async fn run(&mut self, channel: &mut dyn RealtimeChannel) -> TrackingResult<()> {
        channel.join(&self.service_id, self.config.role).await?;
        let mut messages = channel.messages();
        while let Some(message) = messages.next().await {
            self.handle_message(message).await;
        }
        drop(messages);
        self.wait_for_workflow().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Coordinates, DriverSummary, PaymentMethod, Rating, ServiceStatusChange,
    };
    use crate::services::directions::DirectionsResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    const ORIGIN: Coordinates = Coordinates { lat: 18.47, lng: -69.90 };
    const DESTINATION: Coordinates = Coordinates { lat: 18.50, lng: -69.85 };
    const EXTENDED: Coordinates = Coordinates { lat: 18.60, lng: -69.70 };

    fn sample_service(id: &str, state: ServiceState) -> Service {
        Service {
            id: id.to_string(),
            client_id: "cli-1".to_string(),
            driver: Some(DriverSummary {
                id: "drv-1".to_string(),
                first_name: "Juan".to_string(),
                last_name: "Perez".to_string(),
                average_rating: Some(4.8),
            }),
            state,
            payment_method: PaymentMethod::Cash,
            origin: ORIGIN,
            destination: DESTINATION,
            extended_destination: None,
            requires_negotiation: false,
            negotiation_state: None,
            negotiated_amount: None,
            total_cost: 1500.0,
            distance_km: 7.5,
            created_at: Utc::now(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    fn status_change(service: Service) -> InboundMessage {
        InboundMessage::ServiceStatusChange(ServiceStatusChange { service })
    }

    fn location_update(service_id: &str, position: Coordinates) -> InboundMessage {
        InboundMessage::DriverLocationUpdate(DriverLocationUpdate {
            service_id: service_id.to_string(),
            telemetry: DriverTelemetry {
                position,
                speed_kmh: Some(35.0),
                heading_degrees: Some(90.0),
                timestamp_ms: 1_700_000_000_000,
                status_message: None,
                distance_remaining_m: None,
            },
        })
    }

    #[derive(Default)]
    struct MockDirections {
        calls: Mutex<Vec<(Coordinates, Coordinates)>>,
        fail: AtomicBool,
    }

    impl MockDirections {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_target(&self) -> Option<Coordinates> {
            self.calls.lock().unwrap().last().map(|(_, t)| *t)
        }
    }

    #[async_trait]
    impl DirectionsProvider for MockDirections {
        async fn route(
            &self,
            origin: Coordinates,
            destination: Coordinates,
        ) -> TrackingResult<DirectionsResult> {
            self.calls.lock().unwrap().push((origin, destination));
            if self.fail.load(Ordering::SeqCst) {
                return Err(TrackingError::Directions("backend down".to_string()));
            }
            Ok(DirectionsResult {
                geometry: vec![origin, destination],
                duration_seconds: 300.0,
            })
        }
    }

    struct MockApi {
        service: Mutex<Option<Service>>,
        rating: Mutex<Option<Rating>>,
        fail_rating_fetch: AtomicBool,
        rating_fetches: Mutex<usize>,
    }

    impl MockApi {
        fn new(service: Option<Service>) -> Self {
            Self {
                service: Mutex::new(service),
                rating: Mutex::new(None),
                fail_rating_fetch: AtomicBool::new(false),
                rating_fetches: Mutex::new(0),
            }
        }

        fn with_rating(self, rating: Rating) -> Self {
            *self.rating.lock().unwrap() = Some(rating);
            self
        }
    }

    #[async_trait]
    impl ServiceApi for MockApi {
        async fn fetch_service(&self, _service_id: &str) -> TrackingResult<Option<Service>> {
            Ok(self.service.lock().unwrap().clone())
        }

        async fn fetch_rating(&self, _service_id: &str) -> TrackingResult<Option<Rating>> {
            *self.rating_fetches.lock().unwrap() += 1;
            if self.fail_rating_fetch.load(Ordering::SeqCst) {
                return Err(TrackingError::Api("rating endpoint down".to_string()));
            }
            Ok(self.rating.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct CountingPrompts {
        confirms: Mutex<usize>,
        ratings: Mutex<usize>,
    }

    #[async_trait]
    impl CompletionPrompts for CountingPrompts {
        async fn confirm_cash_payment(
            &self,
            _service_id: &str,
            _amount: f64,
            _method: PaymentMethod,
        ) -> TrackingResult<()> {
            *self.confirms.lock().unwrap() += 1;
            Ok(())
        }

        async fn capture_rating(&self, _service_id: &str, _driver_name: &str) -> TrackingResult<()> {
            *self.ratings.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct Harness {
        session: TrackingSession,
        directions: Arc<MockDirections>,
        api: Arc<MockApi>,
        prompts: Arc<CountingPrompts>,
    }

    fn harness(service_id: &str, api: MockApi) -> Harness {
        let directions = Arc::new(MockDirections::default());
        let api = Arc::new(api);
        let prompts = Arc::new(CountingPrompts::default());
        let session = TrackingSession::new(
            service_id,
            SessionConfig::default(),
            directions.clone(),
            api.clone(),
            prompts.clone(),
        );
        Harness {
            session,
            directions,
            api,
            prompts,
        }
    }

    #[tokio::test]
    async fn accepted_transition_does_not_force_route() {
        // Scenario: T1 pending, then accepted over the channel.
        let mut h = harness("T1", MockApi::new(Some(sample_service("T1", ServiceState::Pending))));
        h.session.mount().await.unwrap();
        assert_eq!(h.directions.call_count(), 0);

        h.session
            .handle_message(status_change(sample_service("T1", ServiceState::Accepted)))
            .await;
        assert_eq!(h.session.state(), Some(ServiceState::Accepted));
        assert_eq!(h.directions.call_count(), 0);
        assert!(h.session.telemetry().is_none());

        // First telemetry fix takes the throttled path, targeting origin.
        h.session
            .handle_message(location_update("T1", Coordinates::new(18.47, -69.90)))
            .await;
        assert_eq!(h.directions.call_count(), 1);
        assert_eq!(h.directions.last_target(), Some(ORIGIN));
    }

    #[tokio::test]
    async fn telemetry_bursts_are_throttled() {
        let mut h = harness("T1", MockApi::new(Some(sample_service("T1", ServiceState::Accepted))));
        h.session.mount().await.unwrap();

        h.session
            .handle_message(location_update("T1", Coordinates::new(18.47, -69.90)))
            .await;
        h.session
            .handle_message(location_update("T1", Coordinates::new(18.48, -69.89)))
            .await;
        // Second fix lands inside the 30s window: stored, not routed.
        assert_eq!(h.directions.call_count(), 1);
        assert_eq!(
            h.session.telemetry().unwrap().position,
            Coordinates::new(18.48, -69.89)
        );
    }

    #[tokio::test]
    async fn in_progress_and_extended_destination_force_recompute() {
        // Scenario: T2 forced calls despite the throttle window.
        let mut h = harness("T2", MockApi::new(Some(sample_service("T2", ServiceState::Loading))));
        h.session.mount().await.unwrap();

        h.session
            .handle_message(status_change(sample_service("T2", ServiceState::InProgress)))
            .await;
        assert_eq!(h.directions.call_count(), 1);
        assert_eq!(h.directions.last_target(), Some(DESTINATION));

        // Extended destination appears seconds later, well inside the
        // window; still exactly one more forced call.
        let mut extended = sample_service("T2", ServiceState::InProgress);
        extended.extended_destination = Some(EXTENDED);
        h.session.handle_message(status_change(extended)).await;
        assert_eq!(h.directions.call_count(), 2);
        assert_eq!(h.directions.last_target(), Some(EXTENDED));

        // Repeating the same payload is not a first attachment.
        let mut repeat = sample_service("T2", ServiceState::InProgress);
        repeat.extended_destination = Some(EXTENDED);
        h.session.handle_message(status_change(repeat)).await;
        assert_eq!(h.directions.call_count(), 2);
    }

    #[tokio::test]
    async fn entering_in_progress_with_both_triggers_dispatches_once() {
        let mut h = harness("T2", MockApi::new(Some(sample_service("T2", ServiceState::Loading))));
        h.session.mount().await.unwrap();

        let mut service = sample_service("T2", ServiceState::InProgress);
        service.extended_destination = Some(EXTENDED);
        h.session.handle_message(status_change(service)).await;
        assert_eq!(h.directions.call_count(), 1);
        assert_eq!(h.directions.last_target(), Some(EXTENDED));
    }

    #[tokio::test]
    async fn directions_failure_keeps_previous_route() {
        let mut h = harness("T2", MockApi::new(Some(sample_service("T2", ServiceState::Loading))));
        h.session.mount().await.unwrap();

        h.session
            .handle_message(status_change(sample_service("T2", ServiceState::InProgress)))
            .await;
        let snapshot = h.session.route().cloned();
        assert!(snapshot.is_some());

        h.directions.fail.store(true, Ordering::SeqCst);
        let mut extended = sample_service("T2", ServiceState::InProgress);
        extended.extended_destination = Some(EXTENDED);
        h.session.handle_message(status_change(extended)).await;

        // Forced call went out and failed; the displayed route is untouched.
        assert_eq!(h.directions.call_count(), 2);
        assert_eq!(h.session.route(), snapshot.as_ref());
    }

    #[tokio::test]
    async fn foreign_service_messages_are_discarded() {
        let mut h = harness("T1", MockApi::new(Some(sample_service("T1", ServiceState::Accepted))));
        h.session.mount().await.unwrap();

        h.session
            .handle_message(status_change(sample_service("OTHER", ServiceState::Cancelled)))
            .await;
        h.session
            .handle_message(location_update("OTHER", Coordinates::new(0.0, 0.0)))
            .await;

        assert_eq!(h.session.state(), Some(ServiceState::Accepted));
        assert!(h.session.telemetry().is_none());
        assert_eq!(h.directions.call_count(), 0);
    }

    #[tokio::test]
    async fn completion_via_push_then_fetch_launches_once() {
        let mut h = harness("T3", MockApi::new(Some(sample_service("T3", ServiceState::InProgress))));
        h.session.mount().await.unwrap();

        h.session
            .handle_message(status_change(sample_service("T3", ServiceState::Completed)))
            .await;
        assert!(h.session.flow_launched());

        // The mount-time path reports completion again after a refresh.
        *h.api.service.lock().unwrap() = Some(sample_service("T3", ServiceState::Completed));
        h.session.mount().await.unwrap();
        h.session
            .handle_message(status_change(sample_service("T3", ServiceState::Completed)))
            .await;

        h.session.wait_for_workflow().await;
        assert_eq!(*h.prompts.confirms.lock().unwrap(), 1);
        assert_eq!(*h.prompts.ratings.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn completion_via_fetch_then_push_launches_once() {
        // Reload-resume: the snapshot is already completed at mount.
        let mut h = harness("T3", MockApi::new(Some(sample_service("T3", ServiceState::Completed))));
        h.session.mount().await.unwrap();
        assert!(h.session.flow_launched());

        h.session
            .handle_message(status_change(sample_service("T3", ServiceState::Completed)))
            .await;

        h.session.wait_for_workflow().await;
        assert_eq!(*h.prompts.confirms.lock().unwrap(), 1);
        assert_eq!(*h.prompts.ratings.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn existing_rating_suppresses_workflow() {
        let api = MockApi::new(Some(sample_service("T3", ServiceState::Completed))).with_rating(
            Rating {
                id: "rat-1".to_string(),
                service_id: "T3".to_string(),
                stars: 5,
                comment: None,
                created_at: Utc::now(),
            },
        );
        let mut h = harness("T3", api);
        h.session.mount().await.unwrap();

        assert!(!h.session.flow_launched());
        assert_eq!(*h.prompts.confirms.lock().unwrap(), 0);
        assert_eq!(*h.prompts.ratings.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_rating_check_defers_until_next_signal() {
        let api = MockApi::new(Some(sample_service("T3", ServiceState::InProgress)));
        api.fail_rating_fetch.store(true, Ordering::SeqCst);
        let mut h = harness("T3", api);
        h.session.mount().await.unwrap();

        h.session
            .handle_message(status_change(sample_service("T3", ServiceState::Completed)))
            .await;
        assert!(!h.session.flow_launched());

        // Next completion signal retries the check and launches.
        h.api.fail_rating_fetch.store(false, Ordering::SeqCst);
        h.session
            .handle_message(status_change(sample_service("T3", ServiceState::Completed)))
            .await;
        assert!(h.session.flow_launched());
        assert_eq!(*h.api.rating_fetches.lock().unwrap(), 2);

        h.session.wait_for_workflow().await;
        assert_eq!(*h.prompts.ratings.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn card_payment_skips_confirmation_step() {
        let mut service = sample_service("T4", ServiceState::Completed);
        service.payment_method = PaymentMethod::Card;
        let mut h = harness("T4", MockApi::new(Some(service)));
        h.session.mount().await.unwrap();

        h.session.wait_for_workflow().await;
        assert_eq!(*h.prompts.confirms.lock().unwrap(), 0);
        assert_eq!(*h.prompts.ratings.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cancelled_trip_launches_nothing() {
        let mut h = harness("T5", MockApi::new(Some(sample_service("T5", ServiceState::Accepted))));
        h.session.mount().await.unwrap();

        h.session
            .handle_message(status_change(sample_service("T5", ServiceState::Cancelled)))
            .await;
        assert_eq!(h.session.state(), Some(ServiceState::Cancelled));
        assert!(!h.session.flow_launched());
        assert_eq!(*h.api.rating_fetches.lock().unwrap(), 0);

        // Terminal: a late status push changes nothing.
        h.session
            .handle_message(status_change(sample_service("T5", ServiceState::InProgress)))
            .await;
        assert_eq!(h.session.state(), Some(ServiceState::Cancelled));
    }

    #[tokio::test]
    async fn switch_to_resets_session_state() {
        let mut h = harness("T3", MockApi::new(Some(sample_service("T3", ServiceState::Completed))));
        h.session.mount().await.unwrap();
        assert!(h.session.flow_launched());

        h.session.switch_to("T6");
        assert!(h.session.service().is_none());
        assert!(h.session.telemetry().is_none());
        assert!(h.session.route().is_none());
        assert!(!h.session.flow_launched());

        // Same-id switch is a no-op on the flag.
        *h.api.service.lock().unwrap() = Some(sample_service("T6", ServiceState::Completed));
        h.session.mount().await.unwrap();
        assert!(h.session.flow_launched());
        h.session.switch_to("T6");
        assert!(h.session.flow_launched());
        h.session.wait_for_workflow().await;
    }
}
