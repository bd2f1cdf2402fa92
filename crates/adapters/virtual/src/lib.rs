//! # entigate-adapter-virtual
//!
//! Virtual plugin that simulates devices for testing and demonstration,
//! plus the built-in domains those devices use.
//!
//! ## Provided devices
//!
//! | Device | Entity ID | Behaviour |
//! |--------|-----------|-----------|
//! | Virtual Light | `light.virtual_light` | Honours `on` / `brightness` |
//! | Virtual Sensor | `sensor.virtual_temperature` | Reports `temperature`, refuses commands |
//! | Virtual Switch | `switch.virtual_switch` | Honours `on` |
//!
//! Dispatched commands are applied to the simulated device, which answers
//! with an [`InboundEvent`] correlated to the command. Events are delivered
//! on the channel returned by [`VirtualPlugin::new`].
//!
//! ## Dependency rule
//!
//! Depends on `entigate-app` (port traits) and `entigate-domain` only.

mod devices;
pub mod domains;
pub mod error;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use entigate_app::ports::CommandDispatcher;
use entigate_domain::Payload;
use entigate_domain::command::Command;
use entigate_domain::device::Device;
use entigate_domain::entity::Entity;
use entigate_domain::error::GatewayError;
use entigate_domain::event::InboundEvent;
use entigate_domain::id::{CommandId, EntityId, PluginId};
use entigate_domain::plugin::{Manifest, Registration};

use devices::{VirtualDevice, VirtualLight, VirtualSensor, VirtualSwitch};
use error::VirtualError;

/// Plugin id used when none is configured.
pub const DEFAULT_PLUGIN_ID: &str = "virtual";

/// A device announced by the plugin together with its entities.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub device: Device,
    pub entities: Vec<Entity>,
}

/// Virtual plugin that owns a fixed set of simulated devices.
pub struct VirtualPlugin {
    plugin_id: PluginId,
    devices: BTreeMap<EntityId, VirtualDevice>,
    events: mpsc::UnboundedSender<InboundEvent>,
    offline: AtomicBool,
}

impl VirtualPlugin {
    /// Create the plugin and the receiving end of its event stream.
    #[must_use]
    pub fn new(plugin_id: impl Into<PluginId>) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let light = VirtualLight::default();
        let sensor = VirtualSensor::default();
        let switch = VirtualSwitch::default();

        let mut devices = BTreeMap::new();
        devices.insert(light.entity_id(), VirtualDevice::Light(light));
        devices.insert(sensor.entity_id(), VirtualDevice::Sensor(sensor));
        devices.insert(switch.entity_id(), VirtualDevice::Switch(switch));

        let (events, receiver) = mpsc::unbounded_channel();
        let plugin = Self {
            plugin_id: plugin_id.into(),
            devices,
            events,
            offline: AtomicBool::new(false),
        };
        (plugin, receiver)
    }

    #[must_use]
    pub fn plugin_id(&self) -> &PluginId {
        &self.plugin_id
    }

    /// Announcement to send to the gateway before reporting devices.
    #[must_use]
    pub fn registration(&self) -> Registration {
        Registration {
            manifest: Manifest {
                id: self.plugin_id.clone(),
                name: "Virtual devices".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            rpc_subject: format!("plugins.{}", self.plugin_id),
        }
    }

    /// Records of every simulated device, ordered by entity id.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a record cannot be built.
    pub fn discover(&self) -> Result<Vec<Discovered>, GatewayError> {
        self.devices
            .values()
            .map(|vdev| {
                let (device, entity) = vdev.discover(&self.plugin_id)?;
                Ok(Discovered {
                    device,
                    entities: vec![entity],
                })
            })
            .collect()
    }

    /// While offline every dispatch fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Report the current state of every device, uncorrelated.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::Closed`] if the event receiver was dropped.
    pub fn report_all(&self) -> Result<(), VirtualError> {
        for vdev in self.devices.values() {
            self.emit(vdev, None, vdev.state())?;
        }
        Ok(())
    }

    /// Simulate a new temperature reading on the sensor.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::Closed`] if the event receiver was dropped.
    pub fn report_temperature(&self, temperature: f64) -> Result<(), VirtualError> {
        for vdev in self.devices.values() {
            if let VirtualDevice::Sensor(sensor) = vdev {
                self.emit(vdev, None, sensor.read(temperature))?;
            }
        }
        Ok(())
    }

    fn execute(&self, command: &Command) -> Result<(), VirtualError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(VirtualError::Offline);
        }
        let vdev = self
            .devices
            .get(&command.entity_id)
            .filter(|_| command.plugin_id == self.plugin_id)
            .ok_or_else(|| VirtualError::UnknownEntity(command.entity_id.clone()))?;

        let state = vdev.apply(&command.payload)?;
        tracing::debug!(command_id = %command.id, entity_id = %command.entity_id, "virtual device updated");
        self.emit(vdev, Some(command.id), state)
    }

    fn emit(
        &self,
        vdev: &VirtualDevice,
        correlation_id: Option<CommandId>,
        payload: Payload,
    ) -> Result<(), VirtualError> {
        self.events
            .send(InboundEvent {
                device_id: vdev.device_id(),
                entity_id: vdev.entity_id(),
                correlation_id,
                payload,
            })
            .map_err(|_| VirtualError::Closed)
    }
}

impl CommandDispatcher for VirtualPlugin {
    fn dispatch(&self, command: Command) -> impl Future<Output = Result<(), GatewayError>> + Send {
        let result = self.execute(&command).map_err(GatewayError::from);
        async { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigate_domain::time::now;
    use serde_json::json;

    fn command(entity: &str, device: &str, domain: &str, payload: Payload) -> Command {
        Command {
            id: CommandId::new(),
            plugin_id: PluginId::from(DEFAULT_PLUGIN_ID),
            device_id: device.into(),
            entity_id: entity.into(),
            entity_type: domain.to_string(),
            payload,
            created_at: now(),
        }
    }

    #[test]
    fn should_discover_three_devices() {
        let (plugin, _rx) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
        let discovered = plugin.discover().unwrap();

        assert_eq!(discovered.len(), 3);
        for dd in &discovered {
            assert_eq!(dd.device.plugin_id, PluginId::from(DEFAULT_PLUGIN_ID));
            assert_eq!(dd.entities.len(), 1);
            assert_eq!(dd.entities[0].device_id, dd.device.id);
            assert!(plugin.devices.contains_key(&dd.entities[0].id));
        }
    }

    #[test]
    fn should_announce_manifest_with_subject() {
        let (plugin, _rx) = VirtualPlugin::new("sim");
        let registration = plugin.registration();

        assert_eq!(registration.manifest.id, PluginId::from("sim"));
        assert_eq!(registration.rpc_subject, "plugins.sim");
        assert!(registration.validate().is_ok());
    }

    #[tokio::test]
    async fn should_answer_command_with_correlated_event() {
        let (plugin, mut rx) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
        let cmd = command(
            "light.virtual_light",
            "virtual-light",
            "light",
            json!({"on": true, "brightness": 80}),
        );

        plugin.dispatch(cmd.clone()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.correlation_id, Some(cmd.id));
        assert_eq!(event.entity_id, cmd.entity_id);
        assert_eq!(event.device_id, cmd.device_id);
        assert_eq!(event.payload, json!({"on": true, "brightness": 80}));
    }

    #[tokio::test]
    async fn should_fail_dispatch_for_unknown_entity() {
        let (plugin, _rx) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
        let result = plugin
            .dispatch(command("fan.attic", "attic", "fan", json!({})))
            .await;
        assert!(matches!(result, Err(GatewayError::Collaborator(_))));
    }

    #[tokio::test]
    async fn should_fail_dispatch_addressed_to_another_plugin() {
        let (plugin, mut rx) = VirtualPlugin::new("sim");
        let result = plugin
            .dispatch(command(
                "switch.virtual_switch",
                "virtual-switch",
                "switch",
                json!({"on": true}),
            ))
            .await;

        assert!(matches!(result, Err(GatewayError::Collaborator(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_fail_dispatch_while_offline() {
        let (plugin, mut rx) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
        plugin.set_offline(true);

        let result = plugin
            .dispatch(command(
                "switch.virtual_switch",
                "virtual-switch",
                "switch",
                json!({"on": true}),
            ))
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "collaborator error: plugin is offline");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_fail_dispatch_when_receiver_dropped() {
        let (plugin, rx) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
        drop(rx);

        let result = plugin
            .dispatch(command(
                "switch.virtual_switch",
                "virtual-switch",
                "switch",
                json!({"on": true}),
            ))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn should_report_temperature_uncorrelated() {
        let (plugin, mut rx) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
        plugin.report_temperature(17.25).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.entity_id, EntityId::from("sensor.virtual_temperature"));
        assert!(event.correlation_id.is_none());
        assert_eq!(event.payload["temperature"], 17.25);
    }

    #[tokio::test]
    async fn should_report_every_device_state() {
        let (plugin, mut rx) = VirtualPlugin::new(DEFAULT_PLUGIN_ID);
        plugin.report_all().unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.entity_id.to_string());
        }
        assert_eq!(
            seen,
            vec![
                "light.virtual_light",
                "sensor.virtual_temperature",
                "switch.virtual_switch"
            ]
        );
    }
}
