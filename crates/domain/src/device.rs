//! Device: a physical or logical source of entities.

use serde::{Deserialize, Serialize, Serializer};

use crate::Payload;
use crate::error::{GatewayError, ValidationError};
use crate::id::{DeviceId, PluginId};

/// Opaque configuration blob attached to devices and entities.
///
/// The gateway stores it verbatim; only the owning plugin interprets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpaqueConfig {
    #[serde(default)]
    pub meta: String,
    #[serde(default)]
    pub data: Payload,
}

/// A physical or logical device reported by a plugin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// Plugin that reported, and controls, this device.
    pub plugin_id: PluginId,
    /// Identifier of the device at its source (serial number, MAC, …).
    #[serde(default)]
    pub source_id: String,
    /// Name supplied by the source.
    #[serde(default)]
    pub source_name: String,
    /// Name assigned by the user; never overwritten by re-registration.
    #[serde(default)]
    pub local_name: String,
    #[serde(default)]
    pub config: OpaqueConfig,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Display name: local name, then source name, then source id, then id.
    #[must_use]
    pub fn name(&self) -> &str {
        [
            self.local_name.as_str(),
            self.source_name.as_str(),
            self.source_id.as_str(),
        ]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_else(|| self.id.as_str())
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the id or plugin id is empty.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyDeviceId.into());
        }
        if self.plugin_id.is_empty() {
            return Err(ValidationError::EmptyPluginId.into());
        }
        Ok(())
    }

    /// Apply a re-registration from the source.
    ///
    /// Source-controlled fields are replaced; the user-assigned local name
    /// and the stored configuration are kept.
    pub fn merge_report(&mut self, report: Device) {
        self.plugin_id = report.plugin_id;
        self.source_id = report.source_id;
        self.source_name = report.source_name;
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            id: &'a DeviceId,
            plugin_id: &'a PluginId,
            source_id: &'a str,
            source_name: &'a str,
            local_name: &'a str,
            config: &'a OpaqueConfig,
            name: &'a str,
        }

        Repr {
            id: &self.id,
            plugin_id: &self.plugin_id,
            source_id: &self.source_id,
            source_name: &self.source_name,
            local_name: &self.local_name,
            config: &self.config,
            name: self.name(),
        }
        .serialize(serializer)
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    plugin_id: Option<PluginId>,
    source_id: String,
    source_name: String,
    local_name: String,
    config: OpaqueConfig,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn plugin_id(mut self, plugin_id: impl Into<PluginId>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    #[must_use]
    pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    #[must_use]
    pub fn source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
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

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if the id or plugin id is missing.
    pub fn build(self) -> Result<Device, GatewayError> {
        let device = Device {
            id: self.id.unwrap_or_default(),
            plugin_id: self.plugin_id.unwrap_or_default(),
            source_id: self.source_id,
            source_name: self.source_name,
            local_name: self.local_name,
            config: self.config,
        };
        device.validate()?;
        Ok(device)
    }
}
