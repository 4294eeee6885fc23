// src/session/completion.rs
//
// Post-trip workflow sequencing. The trip-completed signal arrives from two
// independent sources (push event, mount-time fetch); both converge here
// and the launch flag is the sole guard. The session is single-owner, so
// the check-and-set below is race-free.
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{PaymentMethod, Rating, ServiceState};
use crate::services::workflow::CompletionPrompts;

/// Result of the rating-existence check issued once the trip is observed
/// completed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RatingCheck {
    #[default]
    Pending,
    Resolved(Option<Rating>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDecision {
    Launch,
    AlreadyLaunched,
    NotCompleted,
    RatingCheckPending,
    AlreadyRated,
}

#[derive(Debug, Default)]
pub struct CompletionSequencer {
    flow_launched: bool,
    rating_check: RatingCheck,
}

impl CompletionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rating_check(&mut self, rating: Option<Rating>) {
        if self.flow_launched && rating.is_some() {
            // Flag wins: never re-prompt, even if the check reports an
            // existing rating after launch.
            warn!("rating check resolved after workflow launch; keeping flag");
        }
        self.rating_check = RatingCheck::Resolved(rating);
    }

    pub fn rating_check_resolved(&self) -> bool {
        matches!(self.rating_check, RatingCheck::Resolved(_))
    }

    pub fn flow_launched(&self) -> bool {
        self.flow_launched
    }

    /// Decide whether to launch the post-trip workflow. Safe to call from
    /// every potential completion signal; sets the flag synchronously on
    /// `Launch` so no later caller can launch again.
    pub fn try_launch(&mut self, state: ServiceState) -> LaunchDecision {
        if state != ServiceState::Completed {
            return LaunchDecision::NotCompleted;
        }
        if self.flow_launched {
            return LaunchDecision::AlreadyLaunched;
        }
        match &self.rating_check {
            RatingCheck::Pending => LaunchDecision::RatingCheckPending,
            RatingCheck::Resolved(Some(_)) => LaunchDecision::AlreadyRated,
            RatingCheck::Resolved(None) => {
                self.flow_launched = true;
                LaunchDecision::Launch
            }
        }
    }

    /// Only called when the session re-targets a different service.
    pub fn reset(&mut self) {
        self.flow_launched = false;
        self.rating_check = RatingCheck::Pending;
    }
}

/// Run the two-step post-trip workflow: conditional cash payment
/// confirmation, then rating capture. Cash confirmation is re-presented
/// until it resolves; the rating step is never reached before it does.
pub async fn run_completion_workflow(
    prompts: Arc<dyn CompletionPrompts>,
    service_id: String,
    payment_method: PaymentMethod,
    amount: f64,
    driver_name: Option<String>,
) {
    info!(service_id = %service_id, ?payment_method, "launching completion workflow");

    if payment_method.is_cash() {
        loop {
            match prompts
                .confirm_cash_payment(&service_id, amount, payment_method)
                .await
            {
                Ok(()) => break,
                Err(err) => {
                    warn!(service_id = %service_id, error = %err, "cash confirmation not completed, re-presenting");
                }
            }
        }
        debug!(service_id = %service_id, "cash payment confirmed");
    }

    let driver_name = driver_name.unwrap_or_else(|| "your driver".to_string());
    if let Err(err) = prompts.capture_rating(&service_id, &driver_name).await {
        // Rating capture is best effort; the user can still rate from the
        // service history screen.
        warn!(service_id = %service_id, error = %err, "rating capture failed");
    }
}
