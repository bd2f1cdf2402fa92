//! Commands (intent sent from the gateway to the plugin owning an entity)
//! and the mutable lifecycle record tracking each command's outcome.

use serde::{Deserialize, Serialize};

use crate::Payload;
use crate::error::GatewayError;
use crate::id::{CommandId, DeviceId, EntityId, PluginId};
use crate::time::Timestamp;

/// A unit of intent addressed to one entity.
///
/// Immutable once created; its progress lives in [`CommandStatus`].
/// The payload shape is defined by the entity's domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub plugin_id: PluginId,
    pub device_id: DeviceId,
    pub entity_id: EntityId,
    /// Domain of the target entity at creation time.
    pub entity_type: String,
    pub payload: Payload,
    pub created_at: Timestamp,
}

/// Lifecycle state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandState {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl CommandState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for CommandState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome of a status transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status moved from `pending` to a terminal state.
    Applied,
    /// The status already was the requested terminal state; nothing changed.
    Unchanged,
}

/// Mutable lifecycle record of a [`Command`], keyed by command id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    pub command_id: CommandId,
    pub plugin_id: PluginId,
    pub device_id: DeviceId,
    pub entity_id: EntityId,
    pub entity_type: String,
    pub state: CommandState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub last_updated_at: Timestamp,
}

impl CommandStatus {
    /// Initial `pending` status for a freshly created command.
    #[must_use]
    pub fn pending(command: &Command) -> Self {
        Self {
            command_id: command.id,
            plugin_id: command.plugin_id.clone(),
            device_id: command.device_id.clone(),
            entity_id: command.entity_id.clone(),
            entity_type: command.entity_type.clone(),
            state: CommandState::Pending,
            error: None,
            created_at: command.created_at,
            last_updated_at: command.created_at,
        }
    }

    /// Move the command to `succeeded`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadyTerminal`] when the command already
    /// failed. A repeated success is [`Transition::Unchanged`].
    pub fn succeed(&mut self, at: Timestamp) -> Result<Transition, GatewayError> {
        self.transition(CommandState::Succeeded, None, at)
    }

    /// Move the command to `failed`, recording `error`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadyTerminal`] when the command already
    /// succeeded. A repeated failure is [`Transition::Unchanged`] and keeps
    /// the first recorded error.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        at: Timestamp,
    ) -> Result<Transition, GatewayError> {
        self.transition(CommandState::Failed, Some(error.into()), at)
    }

    fn transition(
        &mut self,
        target: CommandState,
        error: Option<String>,
        at: Timestamp,
    ) -> Result<Transition, GatewayError> {
        match self.state {
            CommandState::Pending => {
                self.state = target;
                self.error = error;
                self.last_updated_at = at;
                Ok(Transition::Applied)
            }
            current if current == target => Ok(Transition::Unchanged),
            current => Err(GatewayError::AlreadyTerminal {
                command_id: self.command_id,
                state: current,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn command() -> Command {
        Command {
            id: CommandId::new(),
            plugin_id: PluginId::from("virtual"),
            device_id: DeviceId::from("dev1"),
            entity_id: EntityId::from("e1"),
            entity_type: "light".to_string(),
            payload: serde_json::json!({"on": true}),
            created_at: now(),
        }
    }

    #[test]
    fn should_start_pending_with_creation_timestamps() {
        let cmd = command();
        let status = CommandStatus::pending(&cmd);
        assert_eq!(status.state, CommandState::Pending);
        assert_eq!(status.created_at, cmd.created_at);
        assert_eq!(status.last_updated_at, cmd.created_at);
        assert!(status.error.is_none());
    }

    #[test]
    fn should_apply_success_from_pending() {
        let mut status = CommandStatus::pending(&command());
        let later = now();
        assert_eq!(status.succeed(later).unwrap(), Transition::Applied);
        assert_eq!(status.state, CommandState::Succeeded);
        assert_eq!(status.last_updated_at, later);
    }

    #[test]
    fn should_keep_first_error_when_failed_twice() {
        let mut status = CommandStatus::pending(&command());
        status.fail("timeout", now()).unwrap();
        let updated_at = status.last_updated_at;

        assert_eq!(
            status.fail("unreachable", now()).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(status.state, CommandState::Failed);
        assert_eq!(status.error.as_deref(), Some("timeout"));
        assert_eq!(status.last_updated_at, updated_at);
    }

    #[test]
    fn should_reject_success_after_failure() {
        let mut status = CommandStatus::pending(&command());
        status.fail("timeout", now()).unwrap();

        let result = status.succeed(now());
        assert!(matches!(
            result,
            Err(GatewayError::AlreadyTerminal {
                state: CommandState::Failed,
                ..
            })
        ));
        assert_eq!(status.state, CommandState::Failed);
    }

    #[test]
    fn should_reject_failure_after_success() {
        let mut status = CommandStatus::pending(&command());
        status.succeed(now()).unwrap();

        assert!(status.fail("late", now()).is_err());
        assert_eq!(status.state, CommandState::Succeeded);
        assert!(status.error.is_none());
    }

    #[test]
    fn should_serialize_state_in_lowercase() {
        assert_eq!(
            serde_json::to_string(&CommandState::Succeeded).unwrap(),
            "\"succeeded\""
        );
        assert!(CommandState::Failed.is_terminal());
        assert!(!CommandState::Pending.is_terminal());
    }
}
