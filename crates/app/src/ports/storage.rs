//! Storage port: repository traits for the persistence collaborator.
//!
//! The core keeps its own in-memory state; repositories receive snapshots of
//! every record after each mutation so they can be stored durably, keyed by
//! their identifiers.

use std::future::Future;
use std::sync::Arc;

use entigate_domain::command::{Command, CommandStatus};
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::id::{CommandId, DeviceId, EntityId};

/// Durable storage for [`Device`]s.
pub trait DeviceRepository {
    /// Insert or replace a device.
    fn save_device(
        &self,
        device: Device,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Load every stored device.
    fn load_devices(&self) -> impl Future<Output = Result<Vec<Device>, GatewayError>> + Send;

    /// Delete a device by id.
    fn delete_device(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Durable storage for [`Entity`] records, state triple included.
pub trait EntityRepository {
    /// Insert or replace an entity.
    fn save_entity(
        &self,
        entity: Entity,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Load every stored entity.
    fn load_entities(&self) -> impl Future<Output = Result<Vec<Entity>, GatewayError>> + Send;

    /// Delete an entity by id.
    fn delete_entity(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Durable storage for [`Command`]s and their [`CommandStatus`].
pub trait CommandRepository {
    /// Insert a command. Commands are immutable, so this is write-once.
    fn save_command(
        &self,
        command: Command,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Insert or replace the status of a command.
    fn save_status(
        &self,
        status: CommandStatus,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Get the stored status of a command.
    fn get_status(
        &self,
        id: CommandId,
    ) -> impl Future<Output = Result<Option<CommandStatus>, GatewayError>> + Send;

    /// Load every stored command.
    fn load_commands(&self) -> impl Future<Output = Result<Vec<Command>, GatewayError>> + Send;

    /// Load every stored command status.
    fn load_statuses(
        &self,
    ) -> impl Future<Output = Result<Vec<CommandStatus>, GatewayError>> + Send;
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for Arc<T> {
    fn save_device(
        &self,
        device: Device,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).save_device(device)
    }

    fn load_devices(&self) -> impl Future<Output = Result<Vec<Device>, GatewayError>> + Send {
        (**self).load_devices()
    }

    fn delete_device(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).delete_device(id)
    }
}

impl<T: EntityRepository + Send + Sync> EntityRepository for Arc<T> {
    fn save_entity(
        &self,
        entity: Entity,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).save_entity(entity)
    }

    fn load_entities(&self) -> impl Future<Output = Result<Vec<Entity>, GatewayError>> + Send {
        (**self).load_entities()
    }

    fn delete_entity(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).delete_entity(id)
    }
}

impl<T: CommandRepository + Send + Sync> CommandRepository for Arc<T> {
    fn save_command(
        &self,
        command: Command,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).save_command(command)
    }

    fn save_status(
        &self,
        status: CommandStatus,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).save_status(status)
    }

    fn get_status(
        &self,
        id: CommandId,
    ) -> impl Future<Output = Result<Option<CommandStatus>, GatewayError>> + Send {
        (**self).get_status(id)
    }

    fn load_commands(&self) -> impl Future<Output = Result<Vec<Command>, GatewayError>> + Send {
        (**self).load_commands()
    }

    fn load_statuses(
        &self,
    ) -> impl Future<Output = Result<Vec<CommandStatus>, GatewayError>> + Send {
        (**self).load_statuses()
    }
}
