//! `light` payloads are `{"on": bool, "brightness": 0..=255}`, both keys optional.

use entigate_domain::Payload;
use entigate_domain::domain::DomainBehavior;

use super::{as_object, optional_bool};

const KEYS: [&str; 2] = ["on", "brightness"];

/// Rules of the `light` domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightBehavior;

impl DomainBehavior for LightBehavior {
    fn validate(&self, desired: &Payload) -> Result<(), String> {
        let object = as_object(desired)?;
        if object.is_empty() {
            return Err("light payload must set on or brightness".to_string());
        }
        if let Some(key) = object.keys().find(|key| !KEYS.contains(&key.as_str())) {
            return Err(format!("unsupported light attribute {key}"));
        }
        optional_bool(object, "on")?;
        match object.get("brightness") {
            None => Ok(()),
            Some(value) => match value.as_u64() {
                Some(level) if level <= 255 => Ok(()),
                _ => Err("brightness must be an integer between 0 and 255".to_string()),
            },
        }
    }

    fn validate_reported(&self, reported: &Payload) -> Result<(), String> {
        as_object(reported).map(|_| ())
    }
}
