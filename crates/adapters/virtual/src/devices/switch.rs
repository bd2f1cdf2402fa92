//! Virtual switch honouring `on`.

use std::sync::Mutex;

use serde_json::json;

use entigate_domain::Payload;
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::id::{DeviceId, EntityId, PluginId};

use super::lock;
use crate::domains::SWITCH;
use crate::error::VirtualError;

/// A simulated switch that can be turned on and off.
#[derive(Default)]
pub struct VirtualSwitch {
    on: Mutex<bool>,
}

impl VirtualSwitch {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        DeviceId::from("virtual-switch")
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        EntityId::from("switch.virtual_switch")
    }

    /// Produce the [`Device`] and [`Entity`] records.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a builder fails.
    pub fn discover(&self, plugin_id: &PluginId) -> Result<(Device, Entity), GatewayError> {
        let device = Device::builder()
            .id(self.device_id())
            .plugin_id(plugin_id.clone())
            .source_id("VSwitch-1")
            .source_name("Virtual Switch")
            .build()?;

        let entity = Entity::builder()
            .id(self.entity_id())
            .device_id(self.device_id())
            .domain(SWITCH)
            .local_name("Virtual Switch")
            .action("turn_on")
            .action("turn_off")
            .build()?;

        Ok((device, entity))
    }

    /// Apply `on` from the payload.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::Rejected`] when `on` is missing.
    pub fn apply(&self, payload: &Payload) -> Result<Payload, VirtualError> {
        let on = payload
            .get("on")
            .and_then(Payload::as_bool)
            .ok_or_else(|| VirtualError::Rejected("switch needs an on flag".to_string()))?;
        *lock(&self.on) = on;
        Ok(json!({"on": on}))
    }

    #[must_use]
    pub fn state(&self) -> Payload {
        json!({"on": *lock(&self.on)})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_off() {
        assert_eq!(VirtualSwitch::default().state(), json!({"on": false}));
    }

    #[test]
    fn should_turn_on_then_off() {
        let switch = VirtualSwitch::default();
        assert_eq!(switch.apply(&json!({"on": true})).unwrap(), json!({"on": true}));
        assert_eq!(switch.apply(&json!({"on": false})).unwrap(), json!({"on": false}));
    }

    #[test]
    fn should_reject_payload_without_flag() {
        let switch = VirtualSwitch::default();
        assert!(matches!(
            switch.apply(&json!({"level": 3})),
            Err(VirtualError::Rejected(_))
        ));
    }

    #[test]
    fn should_produce_switch_records() {
        let (device, entity) = VirtualSwitch::default()
            .discover(&PluginId::from("virtual"))
            .unwrap();
        assert_eq!(device.source_id, "VSwitch-1");
        assert_eq!(entity.domain, "switch");
    }
}
