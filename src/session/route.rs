// src/session/route.rs
use std::time::{Duration, Instant};

use crate::models::RouteSnapshot;

/// Route recomputation is rate limited to once per this window unless a
/// force trigger bypasses it.
pub const DEFAULT_ROUTE_REFRESH_INTERVAL: Duration = Duration::from_millis(30_000);

/// Throttled holder of the derived route/ETA view.
///
/// `should_dispatch`/`mark_dispatched` gate the external directions call;
/// the timestamp is taken at dispatch, not at completion, so bursts of
/// telemetry and a failing provider are both rate limited the same way.
/// `apply` replaces the snapshot wholesale, keeping geometry and ETA from
/// the same directions response.
#[derive(Debug)]
pub struct RoutePlanner {
    snapshot: Option<RouteSnapshot>,
    last_dispatched_at: Option<Instant>,
    min_interval: Duration,
}

impl RoutePlanner {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            snapshot: None,
            last_dispatched_at: None,
            min_interval,
        }
    }

    pub fn should_dispatch(&self, now: Instant, force: bool) -> bool {
        if force {
            return true;
        }
        match self.last_dispatched_at {
            None => true,
            Some(last) => now.duration_since(last) >= self.min_interval,
        }
    }

    pub fn mark_dispatched(&mut self, now: Instant) {
        self.last_dispatched_at = Some(now);
    }

    /// Last arrival wins; an in-flight result is never merged with an older
    /// snapshot.
    pub fn apply(&mut self, snapshot: RouteSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub fn snapshot(&self) -> Option<&RouteSnapshot> {
        self.snapshot.as_ref()
    }

    /// Full reset, including the throttle timestamp; used when the session
    /// re-targets a different service.
    pub fn reset(&mut self) {
        self.snapshot = None;
        self.last_dispatched_at = None;
    }
}

impl Default for RoutePlanner {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_REFRESH_INTERVAL)
    }
}
