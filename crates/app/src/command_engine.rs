//! Command lifecycle engine: creates commands and drives their status.
//!
//! ```text
//! pending ──success──▶ succeeded
//!    └─────failure──▶ failed
//! ```
//!
//! Terminal states are final. Repeating the transition that produced the
//! current terminal state is a no-op; attempting the other one fails with
//! [`GatewayError::AlreadyTerminal`].
//!
//! The engine never talks to plugins. Handing a created [`Command`] to the
//! transport is the caller's job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use entigate_domain::Payload;
use entigate_domain::command::{Command, CommandState, CommandStatus, Transition};
use entigate_domain::error::GatewayError;
use entigate_domain::id::{CommandId, DeviceId, EntityId};
use entigate_domain::time::now;

use crate::locks;
use crate::state_store::EntityStateStore;

struct CommandRecord {
    command: Command,
    status: Mutex<CommandStatus>,
}

/// In-memory registry of commands and their lifecycle status.
pub struct CommandEngine {
    store: Arc<EntityStateStore>,
    commands: RwLock<HashMap<CommandId, Arc<CommandRecord>>>,
}

impl CommandEngine {
    /// Create an engine that records desired state into `store`.
    #[must_use]
    pub fn new(store: Arc<EntityStateStore>) -> Self {
        Self {
            store,
            commands: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<EntityStateStore> {
        &self.store
    }

    /// Create a command carrying `payload` to `entity_id` on `device_id`.
    ///
    /// The payload becomes the entity's desired state and the command starts
    /// `pending`. Nothing is recorded when any check fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDevice`] when the device is absent,
    /// [`GatewayError::UnknownEntity`] when the entity is absent or owned by
    /// another device, [`GatewayError::UnknownDomain`] when the entity's domain
    /// is unregistered, or [`GatewayError::InvalidPayload`] when the domain
    /// rejects the payload.
    pub fn create(
        &self,
        device_id: &DeviceId,
        entity_id: &EntityId,
        payload: Payload,
    ) -> Result<Command, GatewayError> {
        let device = self.store.require_device(device_id)?;
        let entity = self.store.require_entity(entity_id)?;
        if entity.device_id != *device_id {
            return Err(GatewayError::UnknownEntity(entity_id.clone()));
        }

        let id = CommandId::new();
        let entity = self
            .store
            .apply_desired(entity_id, payload.clone(), Some(id))?;

        let command = Command {
            id,
            plugin_id: device.plugin_id,
            device_id: device.id,
            entity_id: entity.id,
            entity_type: entity.domain,
            payload,
            created_at: now(),
        };
        let record = CommandRecord {
            status: Mutex::new(CommandStatus::pending(&command)),
            command: command.clone(),
        };
        locks::write(&self.commands).insert(id, Arc::new(record));

        tracing::debug!(
            command_id = %id,
            entity_id = %command.entity_id,
            plugin_id = %command.plugin_id,
            "command created"
        );
        Ok(command)
    }

    /// Resolve a command as `succeeded`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownCommand`] when absent, or
    /// [`GatewayError::AlreadyTerminal`] when the command already failed.
    pub fn mark_succeeded(&self, id: CommandId) -> Result<CommandStatus, GatewayError> {
        let record = self.record(id)?;
        let mut status = locks::lock(&record.status);
        let transition = status.succeed(now())?;
        log_transition(&status, transition);
        Ok(status.clone())
    }

    /// Resolve a command as `failed` with `error`.
    ///
    /// A repeated failure keeps the first recorded error. When the command is
    /// still the entity's latest, the entity's sync status becomes `error`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownCommand`] when absent, or
    /// [`GatewayError::AlreadyTerminal`] when the command already succeeded.
    pub fn mark_failed(
        &self,
        id: CommandId,
        error: impl Into<String>,
    ) -> Result<CommandStatus, GatewayError> {
        let record = self.record(id)?;
        let (snapshot, transition) = {
            let mut status = locks::lock(&record.status);
            let transition = status.fail(error, now())?;
            log_transition(&status, transition);
            (status.clone(), transition)
        };

        if transition == Transition::Applied {
            match self.store.mark_command_failed(&snapshot.entity_id, id) {
                Ok(_) => {}
                Err(GatewayError::UnknownEntity(entity_id)) => {
                    tracing::debug!(command_id = %id, entity_id = %entity_id, "failed command outlived its entity");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(snapshot)
    }

    /// Reload a persisted command with its last known status.
    ///
    /// A missing status, or one recorded for another command, restarts the
    /// command as `pending`. Entity state is left untouched. A command that
    /// is already known keeps its current status.
    #[must_use]
    pub fn restore(&self, command: Command, status: Option<CommandStatus>) -> CommandStatus {
        let status = status
            .filter(|status| status.command_id == command.id)
            .unwrap_or_else(|| CommandStatus::pending(&command));
        let id = command.id;
        let record = Arc::clone(
            locks::write(&self.commands)
                .entry(id)
                .or_insert_with(|| {
                    Arc::new(CommandRecord {
                        command,
                        status: Mutex::new(status),
                    })
                }),
        );
        let status = locks::lock(&record.status).clone();
        tracing::debug!(command_id = %id, state = %status.state, "command restored");
        status
    }

    /// The immutable command record.
    #[must_use]
    pub fn get(&self, id: CommandId) -> Option<Command> {
        locks::read(&self.commands)
            .get(&id)
            .map(|record| record.command.clone())
    }

    /// Current lifecycle status of a command.
    #[must_use]
    pub fn status(&self, id: CommandId) -> Option<CommandStatus> {
        let record = self.record(id).ok()?;
        let status = locks::lock(&record.status).clone();
        Some(status)
    }

    /// Current lifecycle status of a command, failing when it is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownCommand`] when absent.
    pub fn require_status(&self, id: CommandId) -> Result<CommandStatus, GatewayError> {
        self.status(id).ok_or(GatewayError::UnknownCommand(id))
    }

    /// Commands still awaiting an outcome, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<CommandStatus> {
        self.statuses(|status| status.state == CommandState::Pending)
    }

    /// Every command addressed to `entity_id`, oldest first.
    #[must_use]
    pub fn for_entity(&self, entity_id: &EntityId) -> Vec<CommandStatus> {
        self.statuses(|status| status.entity_id == *entity_id)
    }

    fn statuses(&self, keep: impl Fn(&CommandStatus) -> bool) -> Vec<CommandStatus> {
        let records: Vec<Arc<CommandRecord>> =
            locks::read(&self.commands).values().cloned().collect();
        let mut statuses: Vec<CommandStatus> = records
            .iter()
            .map(|record| locks::lock(&record.status).clone())
            .filter(|status| keep(status))
            .collect();
        statuses.sort_by_key(|status| status.created_at);
        statuses
    }

    fn record(&self, id: CommandId) -> Result<Arc<CommandRecord>, GatewayError> {
        locks::read(&self.commands)
            .get(&id)
            .cloned()
            .ok_or(GatewayError::UnknownCommand(id))
    }
}

fn log_transition(status: &CommandStatus, transition: Transition) {
    match transition {
        Transition::Applied => tracing::debug!(
            command_id = %status.command_id,
            state = %status.state,
            "command resolved"
        ),
        Transition::Unchanged => tracing::debug!(
            command_id = %status.command_id,
            state = %status.state,
            "command already resolved, ignoring repeat"
        ),
    }
}
