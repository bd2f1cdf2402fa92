//! Plugin identity, as announced through registration.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, ValidationError};
use crate::id::PluginId;

/// Self-description a plugin sends when it comes online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: PluginId,
    pub name: String,
    pub version: String,
}

/// A plugin announcement: its manifest plus the subject its RPC endpoint
/// listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub manifest: Manifest,
    pub rpc_subject: String,
}

impl Registration {
    /// Identity used to tag commands and events of this plugin.
    #[must_use]
    pub fn plugin_id(&self) -> &PluginId {
        &self.manifest.id
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when the plugin id is empty.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.manifest.id.is_empty() {
            return Err(ValidationError::EmptyPluginId.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_registration_from_wire_format() {
        let json = r#"{
            "manifest": {"id": "hue", "name": "Philips Hue", "version": "1.2.0"},
            "rpc_subject": "plugins.hue.rpc"
        }"#;
        let registration: Registration = serde_json::from_str(json).unwrap();
        assert_eq!(registration.plugin_id().as_str(), "hue");
        assert_eq!(registration.rpc_subject, "plugins.hue.rpc");
        assert!(registration.validate().is_ok());
    }

    #[test]
    fn should_reject_registration_without_plugin_id() {
        let registration = Registration {
            manifest: Manifest {
                id: PluginId::default(),
                name: "nameless".to_string(),
                version: "0.0.0".to_string(),
            },
            rpc_subject: String::new(),
        };
        assert!(matches!(
            registration.validate(),
            Err(GatewayError::Validation(ValidationError::EmptyPluginId))
        ));
    }
}
