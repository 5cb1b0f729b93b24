//! In-memory descriptor registry with flexible name resolution.
//!
//! The registry is built once at startup and then shared read-only, so it
//! carries no interior locking.

use crate::{
    definition::ServiceDescriptor,
    error::{DescriptorError, Result},
    loader::{DescriptorLoader, DescriptorSource},
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tessera_core::ServiceKey;
use tracing::{debug, info, warn};

/// Registry of service descriptors keyed by service key.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: BTreeMap<ServiceKey, Arc<ServiceDescriptor>>,
    name_index: HashMap<String, ServiceKey>,
    sources: HashMap<ServiceKey, DescriptorSource>,
    warnings: Vec<String>,
}

impl DescriptorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every descriptor the loader finds.
    ///
    /// A later descriptor with an already registered key replaces the
    /// earlier one.
    ///
    /// # Errors
    /// Returns error if loading fails.
    pub fn from_loader(loader: &DescriptorLoader) -> Result<Self> {
        let (loaded, warnings) = loader.load_all()?;
        let mut registry = Self::new();

        for entry in loaded {
            let key = entry.descriptor.key().clone();
            registry.insert(entry.descriptor)?;
            registry.sources.insert(key, entry.source);
        }
        registry.warnings = warnings;

        info!(count = registry.count(), "built descriptor registry");

        Ok(registry)
    }

    /// Add or replace a descriptor.
    pub fn insert(&mut self, descriptor: ServiceDescriptor) -> Result<()> {
        descriptor.validate()?;

        let key = descriptor.key().clone();
        for alias in index_names(&descriptor) {
            self.name_index.insert(alias, key.clone());
        }

        debug!(service = %key, "registered service descriptor");
        self.descriptors.insert(key, Arc::new(descriptor));

        Ok(())
    }

    /// Resolve a user-supplied name or key to a registered service key.
    ///
    /// Exact keys match first; otherwise the name is normalized to lowercase
    /// alphanumerics and looked up in the name index.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<ServiceKey> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if let Some((key, _)) = self.descriptors.iter().find(|(k, _)| k.as_str() == name) {
            return Some(key.clone());
        }

        self.name_index.get(&normalize_name(name)).cloned()
    }

    /// Get a descriptor by key, display name or alias.
    ///
    /// # Errors
    /// Returns error if nothing matches.
    pub fn get(&self, name: &str) -> Result<Arc<ServiceDescriptor>> {
        self.resolve(name)
            .and_then(|key| self.descriptors.get(&key).cloned())
            .ok_or_else(|| DescriptorError::NotFound {
                service_key: name.to_string(),
            })
    }

    /// All descriptors, ordered by key.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<ServiceDescriptor>> {
        self.descriptors.values().cloned().collect()
    }

    /// All registered keys, ordered.
    #[must_use]
    pub fn keys(&self) -> Vec<ServiceKey> {
        self.descriptors.keys().cloned().collect()
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether a key is registered.
    #[must_use]
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.descriptors.contains_key(key)
    }

    /// Resolve a list of requested services.
    ///
    /// `None` selects every registered service. Unknown names are logged and
    /// dropped; duplicates collapse to the first occurrence.
    #[must_use]
    pub fn validate_services(&self, requested: Option<&[String]>) -> Vec<ServiceKey> {
        let Some(requested) = requested else {
            return self.keys();
        };

        let mut valid: Vec<ServiceKey> = Vec::new();
        for name in requested {
            match self.resolve(name) {
                Some(key) if !valid.contains(&key) => valid.push(key),
                Some(_) => {}
                None => {
                    let available: Vec<&str> =
                        self.descriptors.keys().map(ServiceKey::as_str).collect();
                    warn!(
                        service = %name,
                        available = %available.join(", "),
                        "unknown service"
                    );
                }
            }
        }
        valid
    }

    /// Services among `services` (or all, when `None`) that require a proxy.
    #[must_use]
    pub fn proxy_required_services(&self, services: Option<&[ServiceKey]>) -> Vec<ServiceKey> {
        self.select(services)
            .filter(|d| d.requires_proxy)
            .map(|d| d.key().clone())
            .collect()
    }

    /// Largest recommended delay among `services` (or all, when `None`).
    ///
    /// Descriptors without a recommendation count as zero.
    #[must_use]
    pub fn max_recommended_delay(&self, services: Option<&[ServiceKey]>) -> Duration {
        let secs = self
            .select(services)
            .map(|d| d.recommended_delay.unwrap_or(0))
            .max()
            .unwrap_or(0);
        Duration::from_secs(secs)
    }

    /// Source file information for a service.
    #[must_use]
    pub fn source_of(&self, name: &str) -> Option<&DescriptorSource> {
        self.resolve(name).and_then(|key| self.sources.get(&key))
    }

    /// Warnings recorded while selecting among duplicate descriptor files.
    #[must_use]
    pub fn duplicate_warnings(&self) -> &[String] {
        &self.warnings
    }

    fn select<'a>(
        &'a self,
        services: Option<&'a [ServiceKey]>,
    ) -> Box<dyn Iterator<Item = &'a Arc<ServiceDescriptor>> + 'a> {
        match services {
            Some(keys) => Box::new(keys.iter().filter_map(|k| self.descriptors.get(k))),
            None => Box::new(self.descriptors.values()),
        }
    }
}

/// Normalize a service name for flexible matching.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn index_names(descriptor: &ServiceDescriptor) -> Vec<String> {
    let key = descriptor.key().as_str();
    let mut names = vec![normalize_name(key), normalize_name(&descriptor.display_name)];

    // `seznamcz` is also reachable as `seznam`
    if key.len() > 2 && key.chars().all(|c| c.is_ascii_lowercase()) {
        names.push(key[..key.len() - 2].to_string());
    }

    names.retain(|n| !n.is_empty());
    names
}
