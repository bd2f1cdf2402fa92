//! Entity state store: the authoritative devices, entities and entity state.
//!
//! Each entity lives behind its own `Mutex`, so updates to unrelated
//! entities never contend; the indexes themselves are only write-locked to
//! add or remove records. Desired and reported updates recompute the
//! effective state and sync status inside the entity's critical section, so
//! no reader can observe a new desired/reported value with a stale
//! effective value.
//!
//! Lock order is devices index, then entities index, then a single entity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use entigate_domain::Payload;
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::id::{CommandId, DeviceId, EntityId, EventId};
use entigate_domain::search::SearchQuery;
use entigate_domain::time::now;

use crate::locks;
use crate::registry::DomainRegistry;

type EntitySlot = Arc<Mutex<Entity>>;

/// Devices and entities matching a [`SearchQuery`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub devices: Vec<Device>,
    pub entities: Vec<Entity>,
}

/// In-memory owner of every device, entity and entity state triple.
pub struct EntityStateStore {
    registry: Arc<DomainRegistry>,
    devices: RwLock<HashMap<DeviceId, Device>>,
    entities: RwLock<HashMap<EntityId, EntitySlot>>,
}

impl EntityStateStore {
    /// Create an empty store resolving domains through `registry`.
    #[must_use]
    pub fn new(registry: Arc<DomainRegistry>) -> Self {
        Self {
            registry,
            devices: RwLock::new(HashMap::new()),
            entities: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DomainRegistry> {
        &self.registry
    }

    // ── Devices ────────────────────────────────────────────────────

    /// Create a device on first report, or merge a re-registration into the
    /// stored one (keeping its local name and config).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if the device breaks an invariant.
    pub fn upsert_device(&self, device: Device) -> Result<Device, GatewayError> {
        device.validate()?;
        let mut devices = locks::write(&self.devices);
        let stored = match devices.get_mut(&device.id) {
            Some(existing) => {
                existing.merge_report(device);
                existing.clone()
            }
            None => {
                tracing::debug!(device_id = %device.id, plugin_id = %device.plugin_id, "device created");
                devices.insert(device.id.clone(), device.clone());
                device
            }
        };
        Ok(stored)
    }

    #[must_use]
    pub fn get_device(&self, id: &DeviceId) -> Option<Device> {
        locks::read(&self.devices).get(id).cloned()
    }

    /// Look up a device, failing when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDevice`] when no device has `id`.
    pub fn require_device(&self, id: &DeviceId) -> Result<Device, GatewayError> {
        self.get_device(id)
            .ok_or_else(|| GatewayError::UnknownDevice(id.clone()))
    }

    /// All devices, ordered by id.
    #[must_use]
    pub fn list_devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = locks::read(&self.devices).values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Set the user-assigned name of a device.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDevice`] when no device has `id`.
    pub fn rename_device(
        &self,
        id: &DeviceId,
        local_name: impl Into<String>,
    ) -> Result<Device, GatewayError> {
        let mut devices = locks::write(&self.devices);
        let device = devices
            .get_mut(id)
            .ok_or_else(|| GatewayError::UnknownDevice(id.clone()))?;
        device.local_name = local_name.into();
        Ok(device.clone())
    }

    /// Explicitly remove a device together with all of its entities.
    ///
    /// Returns the removed device and the ids of the removed entities.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDevice`] when no device has `id`.
    pub fn remove_device(&self, id: &DeviceId) -> Result<(Device, Vec<EntityId>), GatewayError> {
        let mut devices = locks::write(&self.devices);
        let device = devices
            .remove(id)
            .ok_or_else(|| GatewayError::UnknownDevice(id.clone()))?;

        let mut entities = locks::write(&self.entities);
        let mut removed: Vec<EntityId> = entities
            .iter()
            .filter(|(_, slot)| locks::lock(slot).device_id == *id)
            .map(|(entity_id, _)| entity_id.clone())
            .collect();
        for entity_id in &removed {
            entities.remove(entity_id);
        }
        removed.sort();

        tracing::debug!(device_id = %id, entities = removed.len(), "device removed");
        Ok((device, removed))
    }

    // ── Entities ───────────────────────────────────────────────────

    /// Create an entity on first report, or merge a re-registration into
    /// the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for a malformed entity,
    /// [`GatewayError::UnknownDomain`] when its domain is not registered, or
    /// [`GatewayError::UnknownDevice`] when its device does not exist.
    pub fn upsert_entity(&self, entity: Entity) -> Result<Entity, GatewayError> {
        entity.validate()?;
        self.registry.require(&entity.domain)?;

        let devices = locks::read(&self.devices);
        if !devices.contains_key(&entity.device_id) {
            return Err(GatewayError::UnknownDevice(entity.device_id));
        }
        let mut entities = locks::write(&self.entities);

        if let Some(slot) = entities.get(&entity.id) {
            let mut existing = locks::lock(slot);
            existing.device_id = entity.device_id.clone();
            existing.merge_report(entity);
            return Ok(existing.clone());
        }

        tracing::debug!(entity_id = %entity.id, domain = %entity.domain, "entity created");
        entities.insert(entity.id.clone(), Arc::new(Mutex::new(entity.clone())));
        Ok(entity)
    }

    /// Load a previously persisted entity as-is, state triple included.
    ///
    /// # Errors
    ///
    /// Same as [`upsert_entity`](Self::upsert_entity).
    pub fn restore_entity(&self, entity: Entity) -> Result<Entity, GatewayError> {
        entity.validate()?;
        self.registry.require(&entity.domain)?;

        let devices = locks::read(&self.devices);
        if !devices.contains_key(&entity.device_id) {
            return Err(GatewayError::UnknownDevice(entity.device_id));
        }
        let slot = Arc::new(Mutex::new(entity.clone()));
        locks::write(&self.entities).insert(entity.id.clone(), slot);
        Ok(entity)
    }

    #[must_use]
    pub fn get_entity(&self, id: &EntityId) -> Option<Entity> {
        let slot = self.slot(id).ok()?;
        let entity = locks::lock(&slot).clone();
        Some(entity)
    }

    /// Look up an entity, failing when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownEntity`] when no entity has `id`.
    pub fn require_entity(&self, id: &EntityId) -> Result<Entity, GatewayError> {
        let slot = self.slot(id)?;
        let entity = locks::lock(&slot).clone();
        Ok(entity)
    }

    /// All entities, ordered by id.
    #[must_use]
    pub fn list_entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .slots()
            .iter()
            .map(|slot| locks::lock(slot).clone())
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    /// Entities owned by `device_id`, ordered by id.
    #[must_use]
    pub fn entities_for_device(&self, device_id: &DeviceId) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .slots()
            .iter()
            .map(|slot| locks::lock(slot).clone())
            .filter(|entity| entity.device_id == *device_id)
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    /// Explicitly remove an entity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownEntity`] when no entity has `id`.
    pub fn remove_entity(&self, id: &EntityId) -> Result<Entity, GatewayError> {
        let slot = locks::write(&self.entities)
            .remove(id)
            .ok_or_else(|| GatewayError::UnknownEntity(id.clone()))?;
        let entity = locks::lock(&slot).clone();
        Ok(entity)
    }

    // ── State ──────────────────────────────────────────────────────

    /// Validate `payload` against the entity's domain and record it as the
    /// desired state, re-resolving effective state and sync status.
    ///
    /// `command_id` becomes the entity's last command when given.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownEntity`], [`GatewayError::UnknownDomain`]
    /// or [`GatewayError::InvalidPayload`] with the domain's reason.
    pub fn apply_desired(
        &self,
        entity_id: &EntityId,
        payload: Payload,
        command_id: Option<CommandId>,
    ) -> Result<Entity, GatewayError> {
        let slot = self.slot(entity_id)?;
        let mut entity = locks::lock(&slot);
        let descriptor = self.registry.require(&entity.domain)?;
        descriptor
            .behavior
            .validate(&payload)
            .map_err(|reason| GatewayError::InvalidPayload {
                domain: entity.domain.clone(),
                reason,
            })?;

        entity
            .data
            .set_desired(payload, command_id, descriptor.behavior.as_ref(), now());
        tracing::debug!(
            entity_id = %entity_id,
            sync_status = %entity.data.sync_status,
            "desired state applied"
        );
        Ok(entity.clone())
    }

    /// Record `payload` as the reported state observed in event `event_id`,
    /// re-resolving effective state and sync status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownEntity`] when the entity is absent or
    /// not owned by `device_id`, [`GatewayError::UnknownDomain`] or, when the
    /// domain validates reported data, [`GatewayError::InvalidPayload`].
    pub fn apply_reported(
        &self,
        device_id: &DeviceId,
        entity_id: &EntityId,
        payload: Payload,
        event_id: EventId,
    ) -> Result<Entity, GatewayError> {
        let slot = self.slot(entity_id)?;
        let mut entity = locks::lock(&slot);
        if entity.device_id != *device_id {
            return Err(GatewayError::UnknownEntity(entity_id.clone()));
        }
        let descriptor = self.registry.require(&entity.domain)?;
        descriptor
            .behavior
            .validate_reported(&payload)
            .map_err(|reason| GatewayError::InvalidPayload {
                domain: entity.domain.clone(),
                reason,
            })?;

        entity
            .data
            .set_reported(payload, event_id, descriptor.behavior.as_ref(), now());
        tracing::debug!(
            entity_id = %entity_id,
            event_id = %event_id,
            sync_status = %entity.data.sync_status,
            "reported state applied"
        );
        Ok(entity.clone())
    }

    /// Flag the entity's sync status as `error` if `command_id` is still its
    /// last command. Returns whether the status changed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownEntity`] when no entity has `entity_id`.
    pub fn mark_command_failed(
        &self,
        entity_id: &EntityId,
        command_id: CommandId,
    ) -> Result<bool, GatewayError> {
        let slot = self.slot(entity_id)?;
        let changed = locks::lock(&slot).data.mark_command_failed(command_id, now());
        Ok(changed)
    }

    /// Devices and entities matching `query`, each ordered by id.
    #[must_use]
    pub fn search(&self, query: &SearchQuery) -> SearchResults {
        SearchResults {
            devices: self
                .list_devices()
                .into_iter()
                .filter(|device| query.matches_device(device))
                .collect(),
            entities: self
                .list_entities()
                .into_iter()
                .filter(|entity| query.matches_entity(entity))
                .collect(),
        }
    }

    fn slot(&self, id: &EntityId) -> Result<EntitySlot, GatewayError> {
        locks::read(&self.entities)
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownEntity(id.clone()))
    }

    fn slots(&self) -> Vec<EntitySlot> {
        locks::read(&self.entities).values().cloned().collect()
    }
}
