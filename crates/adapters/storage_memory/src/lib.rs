//! # entigate-adapter-storage-memory
//!
//! In-memory persistence adapter.
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `entigate-app::ports::storage`
//! - Keep records keyed by their identifiers
//! - Export and import the whole store as a JSON [`Snapshot`]
//!
//! ## Dependency rule
//! Depends on `entigate-app` (for port traits) and `entigate-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod command_repo;
mod device_repo;
mod entity_repo;
pub mod error;

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use entigate_domain::command::{Command, CommandStatus};
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::id::{CommandId, DeviceId, EntityId};

use crate::error::StorageError;

/// Serializable image of every stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub statuses: Vec<CommandStatus>,
}

/// Record store held in process memory.
#[derive(Default)]
pub struct MemoryStorage {
    devices: RwLock<BTreeMap<DeviceId, Device>>,
    entities: RwLock<BTreeMap<EntityId, Entity>>,
    commands: RwLock<HashMap<CommandId, Command>>,
    statuses: RwLock<HashMap<CommandId, CommandStatus>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let storage = Self::new();
        write(&storage.devices).extend(snapshot.devices.into_iter().map(|d| (d.id.clone(), d)));
        write(&storage.entities).extend(snapshot.entities.into_iter().map(|e| (e.id.clone(), e)));
        write(&storage.commands).extend(snapshot.commands.into_iter().map(|c| (c.id, c)));
        write(&storage.statuses).extend(snapshot.statuses.into_iter().map(|s| (s.command_id, s)));
        storage
    }

    /// Copy every record out. Devices and entities are ordered by id,
    /// commands by creation time.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut commands: Vec<Command> = read(&self.commands).values().cloned().collect();
        commands.sort_by_key(|c| c.created_at);
        let mut statuses: Vec<CommandStatus> = read(&self.statuses).values().cloned().collect();
        statuses.sort_by_key(|s| s.created_at);

        Snapshot {
            devices: read(&self.devices).values().cloned().collect(),
            entities: read(&self.entities).values().cloned().collect(),
            commands,
            statuses,
        }
    }

    /// Serialize the store as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Json`] if a record fails to serialize.
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Build a store from JSON produced by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Json`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(Self::from_snapshot(serde_json::from_str(json)?))
    }

    #[must_use]
    pub fn command(&self, id: CommandId) -> Option<Command> {
        read(&self.commands).get(&id).cloned()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
