// src/services/channel.rs
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::TrackingResult;
use crate::models::{InboundMessage, SessionRole};

/// Reconnect-capable realtime transport, external to this core. The
/// session sends exactly one join per tracked service and then consumes
/// whatever the transport delivers; reconnect policy lives behind this
/// trait.
#[async_trait]
pub trait RealtimeChannel: Send {
    async fn join(&mut self, service_id: &str, role: SessionRole) -> TrackingResult<()>;

    /// Pushed messages, in delivery order. The stream ending means the
    /// transport gave up; the session degrades to last-known state.
    fn messages(&mut self) -> BoxStream<'_, InboundMessage>;
}
