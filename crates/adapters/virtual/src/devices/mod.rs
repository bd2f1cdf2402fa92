//! Virtual device implementations: light, sensor, switch.
//!
//! Each virtual device holds a fixed [`DeviceId`] and [`EntityId`] so they
//! remain stable across restarts of the plugin.

mod light;
mod sensor;
mod switch;

pub use light::VirtualLight;
pub use sensor::VirtualSensor;
pub use switch::VirtualSwitch;

use std::sync::{Mutex, MutexGuard, PoisonError};

use entigate_domain::Payload;
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::id::{DeviceId, EntityId, PluginId};

use crate::error::VirtualError;

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
    Switch(VirtualSwitch),
}

impl VirtualDevice {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::Light(d) => d.device_id(),
            Self::Sensor(d) => d.device_id(),
            Self::Switch(d) => d.device_id(),
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Light(d) => d.entity_id(),
            Self::Sensor(d) => d.entity_id(),
            Self::Switch(d) => d.entity_id(),
        }
    }

    /// Create the [`Device`] and [`Entity`] records announced by `plugin_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a builder fails.
    pub fn discover(&self, plugin_id: &PluginId) -> Result<(Device, Entity), GatewayError> {
        match self {
            Self::Light(d) => d.discover(plugin_id),
            Self::Sensor(d) => d.discover(plugin_id),
            Self::Switch(d) => d.discover(plugin_id),
        }
    }

    /// Apply a commanded payload, returning the full state the device now
    /// reports.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::Rejected`] when the device cannot honour it.
    pub fn apply(&self, payload: &Payload) -> Result<Payload, VirtualError> {
        match self {
            Self::Light(d) => d.apply(payload),
            Self::Sensor(d) => d.apply(payload),
            Self::Switch(d) => d.apply(payload),
        }
    }

    /// Current state as the device would report it.
    #[must_use]
    pub fn state(&self) -> Payload {
        match self {
            Self::Light(d) => d.state(),
            Self::Sensor(d) => d.state(),
            Self::Switch(d) => d.state(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
