// src/session/state_machine.rs
//
// Canonical lifecycle handling for the tracked service. The server is
// authoritative: incoming state values replace the local one (last writer
// wins) and the only client-side validation is that terminal states stay
// terminal. Everything else unexpected is logged, not rejected.
use tracing::warn;

use crate::models::ServiceState;

/// Outcome of applying an inbound state value against the held one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateDecision {
    /// The state actually changed; transition side effects fire exactly once.
    Entered(ServiceState),
    /// Repeated push of the same state; no side effects.
    Unchanged,
    /// The held state is terminal; the event is ignored.
    RejectedTerminal,
}

/// Interpret an inbound state value. `current` is `None` before the first
/// snapshot arrives, in which case any state is an entry.
pub fn apply_state_event(current: Option<ServiceState>, incoming: ServiceState) -> StateDecision {
    let Some(current) = current else {
        return StateDecision::Entered(incoming);
    };

    if current == incoming {
        return StateDecision::Unchanged;
    }

    if current.is_terminal() {
        warn!(
            from = ?current,
            to = ?incoming,
            "ignoring state event on terminal service"
        );
        return StateDecision::RejectedTerminal;
    }

    if incoming.rank() < current.rank() {
        // Transport gives no ordering guarantee, so a stale snapshot can
        // regress the state. Accepted (server is authoritative), but loud.
        warn!(from = ?current, to = ?incoming, "state moved backwards");
    }

    StateDecision::Entered(incoming)
}
