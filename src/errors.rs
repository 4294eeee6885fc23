// src/errors.rs
use thiserror::Error;

/// Main error type for the towline-tracking core.
///
/// Failures from the directions provider and the REST fetches are caught at
/// the call site inside the session, logged, and converted to "retain the
/// previous value", so they never escape message handling. These variants
/// exist for the boundaries where callers do want the cause (mount, the
/// external sub-flows, the demo wiring).
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("directions request failed: {0}")]
    Directions(String),

    #[error("api request failed: {0}")]
    Api(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("realtime channel error: {0}")]
    Channel(String),

    #[error("payment confirmation not completed: {0}")]
    PaymentNotConfirmed(String),

    #[error("rating submission failed: {0}")]
    RatingSubmission(String),

    #[error("network request timed out")]
    NetworkTimeout,

    #[error("http error: {0}")]
    Http(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TrackingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackingError::NetworkTimeout
        } else {
            TrackingError::Http(err.to_string())
        }
    }
}

pub type TrackingResult<T> = Result<T, TrackingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TrackingError::ServiceNotFound("svc-1".to_string());
        assert_eq!(err.to_string(), "service not found: svc-1");
    }

    #[test]
    fn serde_error_converts() {
        let bad: Result<crate::models::ServiceState, _> = serde_json::from_str("\"flying\"");
        let err: TrackingError = bad.unwrap_err().into();
        assert!(matches!(err, TrackingError::InvalidPayload(_)));
    }
}
