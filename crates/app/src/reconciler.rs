//! Event reconciler: turns plugin-reported events into canonical events,
//! reported state and command outcomes.
//!
//! Events are applied in arrival order; nothing is buffered or reordered.
//!
//! The first event correlated to a pending command resolves that command as
//! `succeeded`. Events carry facts, not outcomes: a plugin reports a failed
//! command through the command status path, never through an event.

use std::sync::Arc;

use entigate_domain::command::CommandStatus;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::event::{EntityEventEnvelope, Event, InboundEvent};
use entigate_domain::id::{CommandId, EventId, PluginId};
use entigate_domain::time::now;

use crate::command_engine::CommandEngine;
use crate::state_store::EntityStateStore;

/// Everything produced by reconciling one inbound event.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub event: Event,
    /// Projection of `event` ready for bus fan-out.
    pub envelope: EntityEventEnvelope,
    /// Entity snapshot right after the reported state was applied.
    pub entity: Entity,
    /// Status of the correlated command, when this event resolved it.
    pub resolved: Option<CommandStatus>,
}

/// Applies inbound events to the state store and command engine.
pub struct EventReconciler {
    store: Arc<EntityStateStore>,
    commands: Arc<CommandEngine>,
}

impl EventReconciler {
    #[must_use]
    pub fn new(store: Arc<EntityStateStore>, commands: Arc<CommandEngine>) -> Self {
        Self { store, commands }
    }

    /// Reconcile an event reported by `plugin_id`.
    ///
    /// The event is tagged from the entity as it stood when the reported
    /// state was applied.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownEntity`] when the entity is absent,
    /// does not belong to the event's device, or belongs to a device of
    /// another plugin. Propagates the state store's errors for the reported
    /// payload.
    pub fn ingest(
        &self,
        plugin_id: PluginId,
        inbound: InboundEvent,
    ) -> Result<Reconciled, GatewayError> {
        let owner = self.store.require_entity(&inbound.entity_id)?;
        let device = self.store.require_device(&owner.device_id)?;
        if device.plugin_id != plugin_id {
            tracing::warn!(
                plugin_id = %plugin_id,
                owner = %device.plugin_id,
                entity_id = %inbound.entity_id,
                "event for an entity of another plugin refused"
            );
            return Err(GatewayError::UnknownEntity(inbound.entity_id));
        }

        let event_id = EventId::new();
        let entity = self.store.apply_reported(
            &inbound.device_id,
            &inbound.entity_id,
            inbound.payload.clone(),
            event_id,
        )?;
        let event = Event::from_inbound(event_id, plugin_id, &entity, inbound, now());
        let resolved = event
            .correlation_id
            .and_then(|command_id| self.resolve(command_id, &event));

        tracing::debug!(
            event_id = %event.id,
            entity_id = %event.entity_id,
            entity_type = %event.entity_type,
            resolved = resolved.is_some(),
            "event reconciled"
        );
        Ok(Reconciled {
            envelope: EntityEventEnvelope::from(&event),
            event,
            entity,
            resolved,
        })
    }

    fn resolve(&self, command_id: CommandId, event: &Event) -> Option<CommandStatus> {
        let Some(status) = self.commands.status(command_id) else {
            tracing::debug!(command_id = %command_id, event_id = %event.id, "correlation to unknown command ignored");
            return None;
        };
        if status.entity_id != event.entity_id {
            tracing::warn!(
                command_id = %command_id,
                command_entity = %status.entity_id,
                event_entity = %event.entity_id,
                "correlation to a command for another entity ignored"
            );
            return None;
        }
        if status.state.is_terminal() {
            return None;
        }

        match self.commands.mark_succeeded(command_id) {
            Ok(status) => Some(status),
            Err(err) => {
                // Lost a race against an explicit failure report.
                tracing::debug!(command_id = %command_id, error = %err, "correlated command already resolved");
                None
            }
        }
    }
}
