//! Virtual temperature sensor: reports a reading, accepts no commands.

use std::sync::Mutex;

use serde_json::json;

use entigate_domain::Payload;
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::id::{DeviceId, EntityId, PluginId};

use super::lock;
use crate::domains::SENSOR;
use crate::error::VirtualError;

/// A simulated temperature sensor.
pub struct VirtualSensor {
    temperature: Mutex<f64>,
}

impl Default for VirtualSensor {
    fn default() -> Self {
        Self {
            temperature: Mutex::new(21.5),
        }
    }
}

impl VirtualSensor {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        DeviceId::from("virtual-sensor")
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        EntityId::from("sensor.virtual_temperature")
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
            .source_id("VSensor-1")
            .source_name("Virtual Sensor")
            .build()?;

        let entity = Entity::builder()
            .id(self.entity_id())
            .device_id(self.device_id())
            .domain(SENSOR)
            .local_name("Virtual Temperature")
            .build()?;

        Ok((device, entity))
    }

    /// Sensors are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`VirtualError::Rejected`].
    pub fn apply(&self, _payload: &Payload) -> Result<Payload, VirtualError> {
        Err(VirtualError::Rejected("sensor is read-only".to_string()))
    }

    /// Record a new reading, returning the payload to report.
    pub fn read(&self, temperature: f64) -> Payload {
        *lock(&self.temperature) = temperature;
        self.state()
    }

    #[must_use]
    pub fn state(&self) -> Payload {
        json!({"temperature": *lock(&self.temperature), "unit": "\u{b0}C"})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_fixed_reading() {
        let sensor = VirtualSensor::default();
        assert_eq!(sensor.state()["temperature"], 21.5);
        assert_eq!(sensor.state()["unit"], "\u{b0}C");
    }

    #[test]
    fn should_refuse_commands() {
        let sensor = VirtualSensor::default();
        assert!(matches!(
            sensor.apply(&json!({"temperature": 3})),
            Err(VirtualError::Rejected(_))
        ));
    }

    #[test]
    fn should_report_new_reading() {
        let sensor = VirtualSensor::default();
        assert_eq!(sensor.read(18.0)["temperature"], 18.0);
        assert_eq!(sensor.state()["temperature"], 18.0);
    }
}
