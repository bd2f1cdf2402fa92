//! `sensor`: read-only `{"temperature": number, "unit": string}`.

use entigate_domain::Payload;
use entigate_domain::domain::DomainBehavior;

use super::as_object;

/// Rules of the `sensor` domain. Sensors accept no commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorBehavior;

impl DomainBehavior for SensorBehavior {
    fn validate(&self, _desired: &Payload) -> Result<(), String> {
        Err("sensor is read-only".to_string())
    }

    fn validate_reported(&self, reported: &Payload) -> Result<(), String> {
        let object = as_object(reported)?;
        if object.get("temperature").is_some_and(Payload::is_number) {
            Ok(())
        } else {
            Err("temperature must be a number".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_reject_every_desired_payload() {
        assert_eq!(
            SensorBehavior.validate(&json!({"temperature": 20})).unwrap_err(),
            "sensor is read-only"
        );
    }

    #[test]
    fn should_require_numeric_temperature_when_reported() {
        assert!(SensorBehavior
            .validate_reported(&json!({"temperature": 21.5, "unit": "\u{b0}C"}))
            .is_ok());
        assert!(SensorBehavior
            .validate_reported(&json!({"temperature": "warm"}))
            .is_err());
    }

    #[test]
    fn should_use_reported_as_effective() {
        let reported = json!({"temperature": 19.0});
        assert_eq!(SensorBehavior.merge(None, Some(&reported)), Some(reported));
    }
}
