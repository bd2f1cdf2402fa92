//! Common error types used across the workspace.
//!
//! Every public operation of the gateway core returns either its success
//! value or exactly one [`GatewayError`]. Lookup failures are reported as
//! the `Unknown*` variants, malformed records as [`ValidationError`], and
//! failures of external collaborators (transport, bus, persistence) are
//! boxed into [`GatewayError::Collaborator`].

use crate::command::CommandState;
use crate::id::{CommandId, DeviceId, EntityId, PluginId};

/// Invariant violations detected while building domain records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device id must not be empty")]
    EmptyDeviceId,
    #[error("entity id must not be empty")]
    EmptyEntityId,
    #[error("plugin id must not be empty")]
    EmptyPluginId,
    #[error("domain must not be empty")]
    EmptyDomain,
    #[error("unsupported JSON-RPC version {0:?}")]
    UnsupportedRpcVersion(String),
    #[error("JSON-RPC method must not be empty")]
    EmptyMethod,
}

/// Top-level error of the gateway core.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No descriptor is registered for the domain.
    #[error("unknown domain {0:?}")]
    UnknownDomain(String),

    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("unknown command {0}")]
    UnknownCommand(CommandId),

    /// The plugin never announced itself through registration.
    #[error("unknown plugin {0}")]
    UnknownPlugin(PluginId),

    /// The domain rejected the payload; `reason` is the domain's own text.
    #[error("invalid payload for domain {domain:?}: {reason}")]
    InvalidPayload { domain: String, reason: String },

    /// A transition was attempted out of a terminal command state.
    #[error("command {command_id} is already {state}")]
    AlreadyTerminal {
        command_id: CommandId,
        state: CommandState,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport, bus or persistence collaborator failure.
    #[error("collaborator error: {0}")]
    Collaborator(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    /// Whether the error is a lookup failure for a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownDomain(_)
                | Self::UnknownDevice(_)
                | Self::UnknownEntity(_)
                | Self::UnknownCommand(_)
                | Self::UnknownPlugin(_)
        )
    }
}
