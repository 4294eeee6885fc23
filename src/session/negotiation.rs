// src/session/negotiation.rs
//
// Read-only projection of the price-negotiation track. Never feeds back
// into the service lifecycle.
use crate::models::{NegotiationState, Service};

#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationView {
    pub label: &'static str,
    /// Whether the tracking screen should render the negotiation alert.
    pub show_alert: bool,
    /// Price to show: the negotiated amount while a required negotiation is
    /// unsettled, the service total once settled.
    pub displayed_total: f64,
}

pub fn negotiation_view(service: &Service) -> NegotiationView {
    let state = if service.requires_negotiation {
        service
            .negotiation_state
            .unwrap_or(NegotiationState::PendingEvaluation)
    } else {
        NegotiationState::NotApplicable
    };

    let label = match state {
        NegotiationState::NotApplicable => "Fixed price",
        NegotiationState::PendingEvaluation => "Awaiting price evaluation",
        NegotiationState::Proposed => "Price proposed",
        NegotiationState::Confirmed => "Price confirmed",
        NegotiationState::Accepted => "Price accepted",
        NegotiationState::Rejected => "Price rejected",
    };

    let settled = matches!(
        state,
        NegotiationState::NotApplicable | NegotiationState::Accepted
    );

    NegotiationView {
        label,
        show_alert: service.requires_negotiation && !settled,
        displayed_total: display_total(service),
    }
}

/// Negotiated amount while the negotiation is unsettled, settled total
/// otherwise. Also used by the completion workflow as the amount for the
/// cash payment confirmation.
pub fn display_total(service: &Service) -> f64 {
    let settled = !service.requires_negotiation
        || service.negotiation_state == Some(NegotiationState::Accepted);
    if settled {
        service.total_cost
    } else {
        service.negotiated_amount.unwrap_or(service.total_cost)
    }
}
