//! Domain descriptors: how a category of entity (light, switch, sensor, …)
//! validates and resolves its own payloads.
//!
//! The gateway core never looks inside a payload. It only calls through the
//! [`DomainBehavior`] capability supplied with each [`DomainDescriptor`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::Payload;

/// Payload rules supplied by a domain implementation.
pub trait DomainBehavior: Send + Sync {
    /// Check a desired payload before it is accepted as intent.
    ///
    /// # Errors
    ///
    /// Returns the domain's rejection reason.
    fn validate(&self, desired: &Payload) -> Result<(), String>;

    /// Check a reported payload. Accepts everything unless overridden.
    ///
    /// # Errors
    ///
    /// Returns the domain's rejection reason.
    fn validate_reported(&self, _reported: &Payload) -> Result<(), String> {
        Ok(())
    }

    /// Compute the effective state from the latest desired and reported
    /// payloads. Must be a pure function of its arguments.
    fn merge(&self, desired: Option<&Payload>, reported: Option<&Payload>) -> Option<Payload> {
        overlay(desired, reported)
    }

    /// Whether the reported payload satisfies the desired one.
    fn in_sync(&self, desired: &Payload, reported: &Payload) -> bool {
        contains(reported, desired)
    }
}

/// Default merge: reported keys overlaid on desired when both are objects,
/// otherwise reported when present, else desired.
#[must_use]
pub fn overlay(desired: Option<&Payload>, reported: Option<&Payload>) -> Option<Payload> {
    match (desired, reported) {
        (Some(Payload::Object(desired)), Some(Payload::Object(reported))) => {
            let mut merged = desired.clone();
            for (key, value) in reported {
                merged.insert(key.clone(), value.clone());
            }
            Some(Payload::Object(merged))
        }
        (desired, reported) => reported.or(desired).cloned(),
    }
}

/// Whether every key of `subset` appears in `superset` with an equal value.
/// Non-object payloads compare with plain equality.
#[must_use]
pub fn contains(superset: &Payload, subset: &Payload) -> bool {
    match (superset, subset) {
        (Payload::Object(superset), Payload::Object(subset)) => subset
            .iter()
            .all(|(key, value)| superset.get(key) == Some(value)),
        (superset, subset) => superset == subset,
    }
}

/// Behavior for domains whose payloads need no validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl DomainBehavior for Passthrough {
    fn validate(&self, _desired: &Payload) -> Result<(), String> {
        Ok(())
    }
}

/// A registered device domain.
#[derive(Clone, Serialize)]
pub struct DomainDescriptor {
    /// Globally unique domain key, e.g. `"light"`.
    pub domain: String,
    pub description: String,
    /// Action names entities of this domain may permit.
    pub actions: Vec<String>,
    #[serde(skip)]
    pub behavior: Arc<dyn DomainBehavior>,
}

impl DomainDescriptor {
    /// Describe `domain` with the given payload rules.
    #[must_use]
    pub fn new(domain: impl Into<String>, behavior: impl DomainBehavior + 'static) -> Self {
        Self {
            domain: domain.into(),
            description: String::new(),
            actions: Vec::new(),
            behavior: Arc::new(behavior),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for DomainDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainDescriptor")
            .field("domain", &self.domain)
            .field("description", &self.description)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}
