//! Search query shape for device and entity lookup.

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::entity::Entity;

/// Free-text lookup query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub pattern: String,
}

impl SearchQuery {
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Case-insensitive substring match. An empty pattern matches everything.
    #[must_use]
    pub fn matches(&self, haystack: &str) -> bool {
        self.pattern.is_empty()
            || haystack
                .to_lowercase()
                .contains(&self.pattern.to_lowercase())
    }

    /// Match a device by id, display name or source id.
    #[must_use]
    pub fn matches_device(&self, device: &Device) -> bool {
        self.matches(device.id.as_str())
            || self.matches(device.name())
            || self.matches(&device.source_id)
    }

    /// Match an entity by id, local name or domain.
    #[must_use]
    pub fn matches_entity(&self, entity: &Entity) -> bool {
        self.matches(entity.id.as_str())
            || self.matches(&entity.local_name)
            || self.matches(&entity.domain)
    }
}
