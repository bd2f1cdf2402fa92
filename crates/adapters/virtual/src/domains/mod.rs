//! Built-in domains: payload rules for `light`, `switch` and `sensor`.
//!
//! Every domain expects JSON object payloads. Effective state uses the
//! default overlay merge; sync uses the default containment check.

mod light;
mod sensor;
mod switch;

pub use light::LightBehavior;
pub use sensor::SensorBehavior;
pub use switch::SwitchBehavior;

use entigate_app::registry::DomainRegistry;
use entigate_domain::Payload;
use entigate_domain::domain::DomainDescriptor;

pub const LIGHT: &str = "light";
pub const SWITCH: &str = "switch";
pub const SENSOR: &str = "sensor";

/// Descriptors of every built-in domain.
#[must_use]
pub fn builtin() -> Vec<DomainDescriptor> {
    vec![
        DomainDescriptor::new(LIGHT, LightBehavior)
            .with_description("Dimmable light")
            .with_actions(["turn_on", "turn_off", "set_brightness"]),
        DomainDescriptor::new(SWITCH, SwitchBehavior)
            .with_description("On/off switch")
            .with_actions(["turn_on", "turn_off"]),
        DomainDescriptor::new(SENSOR, SensorBehavior).with_description("Read-only temperature sensor"),
    ]
}

/// Register every built-in domain into `registry`.
pub fn register_builtin(registry: &mut DomainRegistry) {
    for descriptor in builtin() {
        registry.register(descriptor);
    }
}

fn as_object(payload: &Payload) -> Result<&serde_json::Map<String, Payload>, String> {
    payload
        .as_object()
        .ok_or_else(|| "payload must be a JSON object".to_string())
}

fn optional_bool(object: &serde_json::Map<String, Payload>, key: &str) -> Result<(), String> {
    match object.get(key) {
        None | Some(Payload::Bool(_)) => Ok(()),
        Some(_) => Err(format!("{key} must be a boolean")),
    }
}
