//! Events: facts reported by plugins about entities.
//!
//! The same fact appears in three shapes along the pipeline:
//! - [`InboundEvent`]: what the plugin emits, without plugin or domain tags
//! - [`Event`]: the canonical record once the owning entity is resolved
//! - [`EntityEventEnvelope`]: the projection handed to the bus for fan-out

use serde::{Deserialize, Serialize};

use crate::Payload;
use crate::entity::Entity;
use crate::id::{CommandId, DeviceId, EntityId, EventId, PluginId};
use crate::time::Timestamp;

/// Event as emitted by plugin code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub device_id: DeviceId,
    pub entity_id: EntityId,
    /// Command that most likely caused this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CommandId>,
    pub payload: Payload,
}

/// Canonical event, tagged with plugin identity and entity domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub plugin_id: PluginId,
    pub device_id: DeviceId,
    pub entity_id: EntityId,
    /// Domain of the entity at ingestion time.
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CommandId>,
    pub payload: Payload,
    pub created_at: Timestamp,
}

impl Event {
    /// Tag an inbound event with its plugin and the resolved entity.
    ///
    /// Device, entity and domain tags are taken from `entity`.
    #[must_use]
    pub fn from_inbound(
        id: EventId,
        plugin_id: PluginId,
        entity: &Entity,
        inbound: InboundEvent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            plugin_id,
            device_id: entity.device_id.clone(),
            entity_id: entity.id.clone(),
            entity_type: entity.domain.clone(),
            correlation_id: inbound.correlation_id,
            payload: inbound.payload,
            created_at,
        }
    }
}

/// Bus-ready projection of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEventEnvelope {
    pub event_id: EventId,
    pub plugin_id: PluginId,
    pub device_id: DeviceId,
    pub entity_id: EntityId,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CommandId>,
    pub payload: Payload,
    pub created_at: Timestamp,
}

impl From<&Event> for EntityEventEnvelope {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id,
            plugin_id: event.plugin_id.clone(),
            device_id: event.device_id.clone(),
            entity_id: event.entity_id.clone(),
            entity_type: event.entity_type.clone(),
            correlation_id: event.correlation_id,
            payload: event.payload.clone(),
            created_at: event.created_at,
        }
    }
}
