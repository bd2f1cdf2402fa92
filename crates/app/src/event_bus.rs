//! In-process envelope bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use entigate_domain::error::GatewayError;
use entigate_domain::event::EntityEventEnvelope;

use crate::ports::EnvelopePublisher;

/// In-process bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the envelope is simply dropped). Slow subscribers lag and skip
/// envelopes rather than block publishers.
pub struct InProcessEventBus {
    sender: broadcast::Sender<EntityEventEnvelope>,
}

impl InProcessEventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to envelopes published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EntityEventEnvelope> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EnvelopePublisher for InProcessEventBus {
    fn publish(
        &self,
        envelope: EntityEventEnvelope,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        // broadcast::send fails only when there are zero receivers.
        if self.sender.send(envelope).is_err() {
            tracing::trace!("envelope dropped, no subscribers");
        }
        async { Ok(()) }
    }
}
