//! Descriptor registry and specialization.

use super::config::RegistryConfig;
use super::{DefaultAttribute, Descriptor, ManagerUuidExtractor, ScopeHook};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// How a collection's existing rows are loaded for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceStrategy {
    /// Load every row of the collection.
    LocalDbCacheAll,
    /// Load rows referenced by the fetched objects.
    LocalDbFindReferences,
    /// Load rows referenced by the fetched objects and look up the rest
    /// by manager uuid.
    LocalDbFindMissingReferences,
}

impl PersistenceStrategy {
    /// Whether the strategy looks rows up by manager uuid.
    #[must_use]
    pub const fn requires_manager_uuids(self) -> bool {
        matches!(self, PersistenceStrategy::LocalDbFindMissingReferences)
    }
}

/// Overrides applied by [`Registry::specialize`].
///
/// Fields left `None` (or empty) keep the registered value.
#[derive(Debug, Clone, Default)]
pub struct DescriptorOverrides {
    /// Persistence strategy.
    pub strategy: Option<PersistenceStrategy>,
    /// Reconnect batch size.
    pub batch_size: Option<usize>,
    /// Change detection.
    pub change_detection: Option<bool>,
    /// Reconnect eligibility.
    pub reconnect_eligible: Option<bool>,
    /// Parent collections.
    pub parent_collections: Option<Vec<String>>,
    /// Extra or replacement default attributes.
    pub default_attributes: BTreeMap<String, DefaultAttribute>,
    /// Manager uuid extractor, kept only under the rule of
    /// [`Registry::retains_manager_uuid_extractor`].
    pub manager_uuid_extractor: Option<ManagerUuidExtractor>,
    /// Custom targeted scope.
    pub scope_hook: Option<ScopeHook>,
}

impl DescriptorOverrides {
    /// Creates empty overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the persistence strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: PersistenceStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets change detection.
    #[must_use]
    pub fn change_detection(mut self, enabled: bool) -> Self {
        self.change_detection = Some(enabled);
        self
    }

    /// Sets reconnect eligibility.
    #[must_use]
    pub fn reconnect_eligible(mut self, eligible: bool) -> Self {
        self.reconnect_eligible = Some(eligible);
        self
    }

    /// Sets the parent collections.
    #[must_use]
    pub fn parent_collections(mut self, parents: &[&str]) -> Self {
        self.parent_collections = Some(parents.iter().map(|p| (*p).to_string()).collect());
        self
    }

    /// Adds a default attribute.
    #[must_use]
    pub fn default_attribute(mut self, name: impl Into<String>, default: DefaultAttribute) -> Self {
        self.default_attributes.insert(name.into(), default);
        self
    }

    /// Sets the manager uuid extractor.
    #[must_use]
    pub fn manager_uuid_extractor(mut self, extractor: ManagerUuidExtractor) -> Self {
        self.manager_uuid_extractor = Some(extractor);
        self
    }

    /// Sets the scope hook.
    #[must_use]
    pub fn scope_hook(mut self, hook: ScopeHook) -> Self {
        self.scope_hook = Some(hook);
        self
    }
}

/// Registry of descriptors keyed by entity type.
///
/// Registered descriptors are shared and never mutated; specialization
/// produces a new value.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    descriptors: BTreeMap<String, Arc<Descriptor>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor.
    ///
    /// An empty association defaults to the entity type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDescriptor`] if the descriptor fails
    /// validation or its entity type is already registered.
    pub fn register(&mut self, mut descriptor: Descriptor) -> CoreResult<()> {
        descriptor.validate()?;
        if self.descriptors.contains_key(&descriptor.entity_type) {
            return Err(CoreError::invalid_descriptor(
                &descriptor.entity_type,
                "entity type registered twice",
            ));
        }
        if descriptor.association.is_empty() {
            descriptor.association.clone_from(&descriptor.entity_type);
        }
        tracing::trace!(entity_type = %descriptor.entity_type, table = %descriptor.table, "registered descriptor");
        self.descriptors
            .insert(descriptor.entity_type.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Builds a registry from declarative configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any descriptor is invalid.
    pub fn from_config(config: RegistryConfig) -> CoreResult<Self> {
        let mut registry = Self::new();
        for descriptor in config.descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Builds a registry from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the JSON is malformed, or
    /// [`CoreError::InvalidDescriptor`] if a descriptor is invalid.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Self::from_config(RegistryConfig::from_json(json)?)
    }

    /// Builds a registry from a JSON file.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::from_json`], plus unreadable files.
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::from_config(RegistryConfig::from_path(path)?)
    }

    /// Looks up the descriptor of an entity type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityType`] if none is registered.
    pub fn lookup(&self, entity_type: &str) -> CoreResult<Arc<Descriptor>> {
        self.descriptors
            .get(entity_type)
            .cloned()
            .ok_or_else(|| CoreError::unknown_entity_type(entity_type))
    }

    /// Whether the entity type is registered.
    pub fn contains(&self, entity_type: &str) -> bool {
        self.descriptors.contains_key(entity_type)
    }

    /// Registered entity types in name order.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Whether specialization keeps the overrides' manager uuid extractor.
    ///
    /// The extractor is kept only if the overrides supply one and select
    /// a strategy that looks rows up by manager uuid.
    pub fn retains_manager_uuid_extractor(overrides: &DescriptorOverrides) -> bool {
        overrides.manager_uuid_extractor.is_some()
            && overrides
                .strategy
                .is_some_and(PersistenceStrategy::requires_manager_uuids)
    }

    /// Returns a copy of a registered descriptor with overrides applied.
    ///
    /// The registered descriptor is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntityType`] if the base is not
    /// registered, or [`CoreError::InvalidDescriptor`] if the result is
    /// invalid.
    pub fn specialize(&self, entity_type: &str, overrides: DescriptorOverrides) -> CoreResult<Descriptor> {
        let base = self.lookup(entity_type)?;
        let mut descriptor = Descriptor::clone(&base);
        let retain_extractor = Self::retains_manager_uuid_extractor(&overrides);

        if let Some(strategy) = overrides.strategy {
            descriptor.strategy = Some(strategy);
        }
        if let Some(size) = overrides.batch_size {
            descriptor.batch_size = size;
        }
        if let Some(enabled) = overrides.change_detection {
            descriptor.change_detection = enabled;
        }
        if let Some(eligible) = overrides.reconnect_eligible {
            descriptor.reconnect_eligible = eligible;
        }
        if let Some(parents) = overrides.parent_collections {
            descriptor.parent_collections = parents;
        }
        descriptor.default_attributes.extend(overrides.default_attributes);
        if let Some(hook) = overrides.scope_hook {
            descriptor.hooks.scope = Some(hook);
        }
        descriptor.hooks.manager_uuid_extractor = if retain_extractor {
            overrides.manager_uuid_extractor
        } else {
            None
        };

        descriptor.validate()?;
        Ok(descriptor)
    }
}
