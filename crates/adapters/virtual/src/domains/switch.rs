//! `switch` payloads are `{"on": bool}`.

use entigate_domain::Payload;
use entigate_domain::domain::DomainBehavior;

use super::as_object;

/// Rules of the `switch` domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchBehavior;

impl DomainBehavior for SwitchBehavior {
    fn validate(&self, desired: &Payload) -> Result<(), String> {
        let object = as_object(desired)?;
        match object.get("on") {
            Some(Payload::Bool(_)) if object.len() == 1 => Ok(()),
            Some(Payload::Bool(_)) => Err("switch payload only accepts on".to_string()),
            _ => Err("on must be a boolean".to_string()),
        }
    }

    fn validate_reported(&self, reported: &Payload) -> Result<(), String> {
        as_object(reported).map(|_| ())
    }
}
