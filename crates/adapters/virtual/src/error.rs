//! Virtual plugin error type.

use entigate_domain::error::GatewayError;
use entigate_domain::id::EntityId;

/// Errors raised while simulating a device.
#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    /// The command targets an entity this plugin does not simulate.
    #[error("entity {0} is not simulated by this plugin")]
    UnknownEntity(EntityId),

    /// The simulated device refused the payload.
    #[error("device rejected payload: {0}")]
    Rejected(String),

    /// The plugin was switched offline.
    #[error("plugin is offline")]
    Offline,

    /// Nobody is listening for events any more.
    #[error("event channel closed")]
    Closed,
}

impl From<VirtualError> for GatewayError {
    fn from(err: VirtualError) -> Self {
        Self::Collaborator(Box::new(err))
    }
}
