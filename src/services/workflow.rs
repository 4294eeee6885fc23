// src/services/workflow.rs
use async_trait::async_trait;
use tracing::info;

use crate::errors::TrackingResult;
use crate::models::PaymentMethod;

/// The two user-facing post-trip sub-flows. Both suspend until the user
/// finishes (or abandons) the interaction; their network calls are their
/// own concern.
#[async_trait]
pub trait CompletionPrompts: Send + Sync {
    /// Present the cash payment confirmation. Resolves `Ok` only on a
    /// successful confirmation; any other outcome is an error the caller
    /// may retry.
    async fn confirm_cash_payment(
        &self,
        service_id: &str,
        amount: f64,
        method: PaymentMethod,
    ) -> TrackingResult<()>;

    /// Present the rating capture for the named driver. Successful
    /// submission is what populates the rating record server-side.
    async fn capture_rating(&self, service_id: &str, driver_name: &str) -> TrackingResult<()>;
}

/// Headless prompts that confirm immediately; used by the demo binary.
pub struct AutoPrompts;

#[async_trait]
impl CompletionPrompts for AutoPrompts {
    async fn confirm_cash_payment(
        &self,
        service_id: &str,
        amount: f64,
        method: PaymentMethod,
    ) -> TrackingResult<()> {
        info!(%service_id, amount, ?method, "payment confirmed");
        Ok(())
    }

    async fn capture_rating(&self, service_id: &str, driver_name: &str) -> TrackingResult<()> {
        info!(%service_id, driver_name, "rating submitted");
        Ok(())
    }
}
