//! Virtual light honouring `on` and `brightness`.

use std::sync::Mutex;

use serde_json::json;

use entigate_domain::Payload;
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::id::{DeviceId, EntityId, PluginId};

use super::lock;
use crate::domains::LIGHT;
use crate::error::VirtualError;

#[derive(Debug, Clone, Copy)]
struct LightState {
    on: bool,
    brightness: u8,
}

/// A simulated dimmable light.
pub struct VirtualLight {
    state: Mutex<LightState>,
}

impl Default for VirtualLight {
    fn default() -> Self {
        Self {
            state: Mutex::new(LightState {
                on: false,
                brightness: 255,
            }),
        }
    }
}

impl VirtualLight {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        DeviceId::from("virtual-light")
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        EntityId::from("light.virtual_light")
    }

    /// Produce the [`Device`] and [`Entity`] records.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a builder fails (should not happen
    /// with hardcoded inputs).
    pub fn discover(&self, plugin_id: &PluginId) -> Result<(Device, Entity), GatewayError> {
        let device = Device::builder()
            .id(self.device_id())
            .plugin_id(plugin_id.clone())
            .source_id("VLight-1")
            .source_name("Virtual Light")
            .build()?;

        let entity = Entity::builder()
            .id(self.entity_id())
            .device_id(self.device_id())
            .domain(LIGHT)
            .local_name("Virtual Light")
            .action("turn_on")
            .action("turn_off")
            .action("set_brightness")
            .build()?;

        Ok((device, entity))
    }

    /// Apply `on` / `brightness` from the payload, ignoring other keys.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::Rejected`] for brightness outside `0..=255`.
    pub fn apply(&self, payload: &Payload) -> Result<Payload, VirtualError> {
        let mut state = lock(&self.state);
        if let Some(on) = payload.get("on").and_then(Payload::as_bool) {
            state.on = on;
        }
        if let Some(level) = payload.get("brightness").and_then(Payload::as_u64) {
            state.brightness = u8::try_from(level)
                .map_err(|_| VirtualError::Rejected(format!("brightness {level} out of range")))?;
        }
        Ok(json!({"on": state.on, "brightness": state.brightness}))
    }

    #[must_use]
    pub fn state(&self) -> Payload {
        let state = *lock(&self.state);
        json!({"on": state.on, "brightness": state.brightness})
    }
}
