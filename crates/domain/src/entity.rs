//! Entity: the addressable unit of control and observation.
//!
//! Each entity belongs to exactly one device and one domain, and carries an
//! [`EntityData`] triple: the *desired* state set by commands, the *reported*
//! state received from the plugin, and the *effective* state resolved from
//! both by the domain's rules.

use serde::{Deserialize, Serialize};

use crate::Payload;
use crate::device::OpaqueConfig;
use crate::domain::DomainBehavior;
use crate::error::{GatewayError, ValidationError};
use crate::id::{CommandId, DeviceId, EntityId, EventId};
use crate::time::Timestamp;

/// Whether desired and reported state currently agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    InSync,
    Pending,
    /// The last command for this entity failed.
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InSync => f.write_str("in_sync"),
            Self::Pending => f.write_str("pending"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Desired / reported / effective state of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<Payload>,
    /// Always derived from `desired` and `reported`; never set directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective: Option<Payload>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command_id: Option<CommandId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl EntityData {
    /// Record new intent and re-resolve effective state and sync status.
    pub fn set_desired(
        &mut self,
        payload: Payload,
        command_id: Option<CommandId>,
        behavior: &dyn DomainBehavior,
        at: Timestamp,
    ) {
        self.desired = Some(payload);
        if command_id.is_some() {
            self.last_command_id = command_id;
        }
        self.recompute(behavior, at);
    }

    /// Record a reported fact and re-resolve effective state and sync status.
    pub fn set_reported(
        &mut self,
        payload: Payload,
        event_id: EventId,
        behavior: &dyn DomainBehavior,
        at: Timestamp,
    ) {
        self.reported = Some(payload);
        self.last_event_id = Some(event_id);
        self.recompute(behavior, at);
    }

    /// Flag the entity as out of sync because `command_id` failed.
    ///
    /// Ignored when a newer command has since targeted the entity.
    /// Returns whether the status changed.
    pub fn mark_command_failed(&mut self, command_id: CommandId, at: Timestamp) -> bool {
        if self.last_command_id != Some(command_id) {
            return false;
        }
        self.sync_status = SyncStatus::Error;
        self.updated_at = Some(at);
        true
    }

    fn recompute(&mut self, behavior: &dyn DomainBehavior, at: Timestamp) {
        self.effective = behavior.merge(self.desired.as_ref(), self.reported.as_ref());
        self.sync_status = match (&self.desired, &self.reported) {
            (None, _) => SyncStatus::InSync,
            (Some(_), None) => SyncStatus::Pending,
            (Some(desired), Some(reported)) if behavior.in_sync(desired, reported) => {
                SyncStatus::InSync
            }
            (Some(_), Some(_)) => SyncStatus::Pending,
        };
        self.updated_at = Some(at);
    }
}

/// A controllable or observable unit owned by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub device_id: DeviceId,
    /// Key of the entity's [`DomainDescriptor`](crate::domain::DomainDescriptor).
    pub domain: String,
    #[serde(default)]
    pub local_name: String,
    #[serde(default)]
    pub config: OpaqueConfig,
    /// Action names this entity permits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default)]
    pub data: EntityData,
}

impl Entity {
    /// Create a builder for constructing an [`Entity`].
    #[must_use]
    pub fn builder() -> EntityBuilder {
        EntityBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the id, device id or domain
    /// is empty.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyEntityId.into());
        }
        if self.device_id.is_empty() {
            return Err(ValidationError::EmptyDeviceId.into());
        }
        if self.domain.is_empty() {
            return Err(ValidationError::EmptyDomain.into());
        }
        Ok(())
    }

    /// Apply a re-registration from the plugin.
    ///
    /// The permitted actions follow the report. State, local name and config
    /// are kept, unless the domain changed, in which case the state is reset
    /// because the old payloads no longer belong to the entity's domain.
    pub fn merge_report(&mut self, report: Entity) {
        if self.domain != report.domain {
            self.domain = report.domain;
            self.data = EntityData::default();
        }
        self.actions = report.actions;
    }
}

/// Step-by-step builder for [`Entity`].
#[derive(Debug, Default)]
pub struct EntityBuilder {
    id: Option<EntityId>,
    device_id: Option<DeviceId>,
    domain: Option<String>,
    local_name: String,
    config: OpaqueConfig,
    actions: Vec<String>,
}

impl EntityBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn local_name(mut self, local_name: impl Into<String>) -> Self {
        self.local_name = local_name.into();
        self
    }

    #[must_use]
    pub fn config(mut self, config: OpaqueConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Consume the builder, validate, and return an [`Entity`] with empty state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if the id, device id or domain is
    /// missing.
    pub fn build(self) -> Result<Entity, GatewayError> {
        let entity = Entity {
            id: self.id.unwrap_or_default(),
            device_id: self.device_id.unwrap_or_default(),
            domain: self.domain.unwrap_or_default(),
            local_name: self.local_name,
            config: self.config,
            actions: self.actions,
            data: EntityData::default(),
        };
        entity.validate()?;
        Ok(entity)
    }
}
