//! Domain registry: the table of known device domains.
//!
//! Built once during start-up, then shared behind an `Arc` with the
//! components that need domain lookups. Registration takes `&mut self`, so
//! the borrow checker enforces the single-writer phase; afterwards reads are
//! lock-free.

use std::collections::BTreeMap;

use entigate_domain::domain::DomainDescriptor;
use entigate_domain::error::GatewayError;

/// Domain descriptors keyed by domain name.
#[derive(Debug, Default, Clone)]
pub struct DomainRegistry {
    descriptors: BTreeMap<String, DomainDescriptor>,
}

impl DomainRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the descriptor under its domain key.
    pub fn register(&mut self, descriptor: DomainDescriptor) {
        if let Some(previous) = self
            .descriptors
            .insert(descriptor.domain.clone(), descriptor)
        {
            tracing::debug!(domain = %previous.domain, "domain descriptor replaced");
        }
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, descriptor: DomainDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Look up a descriptor; `None` means the domain is not recognised.
    #[must_use]
    pub fn get(&self, domain: &str) -> Option<&DomainDescriptor> {
        self.descriptors.get(domain)
    }

    /// Look up a descriptor, failing for unrecognised domains.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownDomain`] when nothing is registered
    /// under `domain`.
    pub fn require(&self, domain: &str) -> Result<&DomainDescriptor, GatewayError> {
        self.get(domain)
            .ok_or_else(|| GatewayError::UnknownDomain(domain.to_string()))
    }

    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        self.descriptors.contains_key(domain)
    }

    /// Snapshot of every descriptor, sorted by domain key ascending.
    #[must_use]
    pub fn all(&self) -> Vec<DomainDescriptor> {
        self.descriptors.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
