//! Event bus port: fan-out of normalized entity events.

use std::future::Future;

use entigate_domain::error::GatewayError;
use entigate_domain::event::EntityEventEnvelope;

/// Publishes [`EntityEventEnvelope`]s to interested subscribers.
pub trait EnvelopePublisher {
    /// Publish an envelope to all current subscribers.
    fn publish(
        &self,
        envelope: EntityEventEnvelope,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

impl<T: EnvelopePublisher + Send + Sync> EnvelopePublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        envelope: EntityEventEnvelope,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).publish(envelope)
    }
}
