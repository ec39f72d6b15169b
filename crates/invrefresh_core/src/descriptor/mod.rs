//! Collection descriptors.
//!
//! A [`Descriptor`] is the per-entity-type configuration the core consumes:
//! which table rows live in, which attributes form the natural key, how
//! objects default their attributes and whether orphaned rows may be
//! reclaimed. Descriptors are plain data and can be loaded from JSON; the
//! few behaviours that cannot be expressed as data live in [`Hooks`].

mod catalog;
mod config;
mod registry;

pub use catalog::infra_registry;
pub use config::RegistryConfig;
pub use registry::{DescriptorOverrides, PersistenceStrategy, Registry};

use crate::error::{CoreError, CoreResult};
use crate::object::{AttributeValue, BuildContext, InventoryObject};
use invrefresh_storage::{Filter, JoinHop, JoinScope};
use invrefresh_value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Default number of keys per reconnect batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default column linking a row to its managed system.
pub const DEFAULT_OWNER_COLUMN: &str = "ems_id";

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_owner_column() -> String {
    DEFAULT_OWNER_COLUMN.to_string()
}

fn default_true() -> bool {
    true
}

/// One component of a natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyAttribute {
    /// A plain attribute stored in a column of the same name.
    Scalar {
        /// Attribute and column name.
        name: String,
    },
    /// A reference to an object of another collection.
    Reference {
        /// Attribute name on the inventory object.
        name: String,
        /// Column holding the referenced row id.
        column: String,
        /// Entity type of the referenced collection.
        collection: String,
    },
}

impl KeyAttribute {
    /// Creates a scalar key attribute.
    pub fn scalar(name: impl Into<String>) -> Self {
        KeyAttribute::Scalar { name: name.into() }
    }

    /// Creates a reference key attribute whose column is `<name>_id`.
    pub fn reference(name: impl Into<String>, collection: impl Into<String>) -> Self {
        let name = name.into();
        KeyAttribute::Reference {
            column: format!("{name}_id"),
            name,
            collection: collection.into(),
        }
    }

    /// Attribute name on the inventory object.
    pub fn name(&self) -> &str {
        match self {
            KeyAttribute::Scalar { name } | KeyAttribute::Reference { name, .. } => name,
        }
    }

    /// Column holding this component on a persisted row.
    pub fn column(&self) -> &str {
        match self {
            KeyAttribute::Scalar { name } => name,
            KeyAttribute::Reference { column, .. } => column,
        }
    }
}

/// Value given to an attribute the fetched object did not set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAttribute {
    /// A fixed value.
    Constant(Value),
    /// Row id of the managed system performing the refresh.
    ManagerId,
}

impl DefaultAttribute {
    /// Creates a constant default.
    pub fn constant(value: impl Into<Value>) -> Self {
        DefaultAttribute::Constant(value.into())
    }

    /// Evaluates the default in a build context.
    pub fn evaluate(&self, ctx: &BuildContext) -> Value {
        match self {
            DefaultAttribute::Constant(value) => value.clone(),
            DefaultAttribute::ManagerId => ctx.manager_id.map(Value::from).unwrap_or_default(),
        }
    }
}

/// How the external save path persists a collection.
///
/// The core only carries this tag; it does not change reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStrategy {
    /// Row by row with model hooks.
    #[default]
    Default,
    /// Batched inserts and updates.
    Batch,
    /// Row by row, safe against concurrent refreshes.
    ConcurrentSafe,
    /// Batched, safe against concurrent refreshes.
    ConcurrentSafeBatch,
}

/// Column value that tells rows of this collection apart from other
/// collections sharing the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discriminator {
    /// Column read.
    pub column: String,
    /// Value rows of this collection carry.
    pub value: Value,
}

impl Discriminator {
    /// Creates a discriminator.
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Filter selecting rows of this collection.
    pub fn filter(&self) -> Filter {
        Filter::Eq(self.column.clone(), self.value.clone())
    }
}

/// How to reach the parent rows a targeted refresh knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDefinition {
    /// Reference chain from this collection's table to the parent table.
    pub path: Vec<JoinHop>,
    /// Column of the parent table holding the manager uuid.
    pub key_column: String,
}

impl ScopeDefinition {
    /// Creates a scope definition.
    pub fn new(path: Vec<JoinHop>, key_column: impl Into<String>) -> Self {
        Self {
            path,
            key_column: key_column.into(),
        }
    }

    /// Join scope restricted to parents whose key is one of `keys`.
    pub fn join(&self, keys: Vec<Value>) -> JoinScope {
        JoinScope::new(self.path.clone(), Filter::any_of(self.key_column.clone(), keys))
    }
}

/// A same-collection reference resolved after save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfReference {
    /// Object attribute holding the parent's natural key.
    pub parent_key_attribute: String,
    /// Column of the parent row matched against that key.
    pub lookup_column: String,
    /// Column on the child row receiving the parent's id.
    pub foreign_key: String,
}

impl SelfReference {
    /// Creates a self reference.
    pub fn new(
        parent_key_attribute: impl Into<String>,
        lookup_column: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            parent_key_attribute: parent_key_attribute.into(),
            lookup_column: lookup_column.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Derives the manager uuid of an object of a parent collection.
#[derive(Clone)]
pub struct ManagerUuidExtractor(Arc<dyn Fn(&InventoryObject) -> Option<Value> + Send + Sync>);

impl ManagerUuidExtractor {
    /// Wraps an extraction function.
    pub fn new(f: impl Fn(&InventoryObject) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Extracts the manager uuid of `object`.
    pub fn extract(&self, object: &InventoryObject) -> Option<Value> {
        (self.0)(object)
    }
}

impl fmt::Debug for ManagerUuidExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ManagerUuidExtractor(..)")
    }
}

/// Builds a custom targeted scope from the union of known parent keys.
///
/// Returning `None` falls back to an unscoped query.
#[derive(Clone)]
pub struct ScopeHook(Arc<dyn Fn(&Descriptor, &[Value]) -> Option<JoinScope> + Send + Sync>);

impl ScopeHook {
    /// Wraps a scope function.
    pub fn new(
        f: impl Fn(&Descriptor, &[Value]) -> Option<JoinScope> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    /// Builds the scope.
    pub fn build(&self, descriptor: &Descriptor, keys: &[Value]) -> Option<JoinScope> {
        (self.0)(descriptor, keys)
    }
}

impl fmt::Debug for ScopeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScopeHook(..)")
    }
}

/// Behaviour that cannot be expressed as data.
///
/// Absent hooks mean the default algorithm applies.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    /// Overrides how manager uuids are derived from objects of this
    /// collection when it acts as a parent of a targeted refresh.
    pub manager_uuid_extractor: Option<ManagerUuidExtractor>,
    /// Overrides how the targeted scope is built from known parent keys.
    pub scope: Option<ScopeHook>,
}

/// Configuration of one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    /// Entity type name, unique within a registry.
    pub entity_type: String,
    /// Table holding the rows.
    pub table: String,
    /// Name of the collection on the managed system.
    #[serde(default)]
    pub association: String,
    /// Ordered natural key. Never empty.
    pub natural_key: Vec<KeyAttribute>,
    /// Collections whose known keys scope a targeted refresh.
    #[serde(default)]
    pub parent_collections: Vec<String>,
    /// Attributes an inventory object may carry. Empty allows any.
    #[serde(default)]
    pub attributes: BTreeSet<String>,
    /// Attributes never written to rows.
    #[serde(default)]
    pub attribute_blacklist: BTreeSet<String>,
    /// Defaults for attributes the fetched object did not set.
    #[serde(default)]
    pub default_attributes: BTreeMap<String, DefaultAttribute>,
    /// Columns receiving the row id of referenced objects, by attribute.
    /// Attributes not listed use `<name>_id`.
    #[serde(default)]
    pub reference_columns: BTreeMap<String, String>,
    /// Persistence tag for the external save path.
    #[serde(default)]
    pub save_strategy: SaveStrategy,
    /// Selected persistence strategy, set by specialization.
    #[serde(default)]
    pub strategy: Option<PersistenceStrategy>,
    /// Whether orphaned rows may be reclaimed.
    #[serde(default)]
    pub reconnect_eligible: bool,
    /// Skip writes when nothing changed.
    #[serde(default = "default_true")]
    pub change_detection: bool,
    /// Keys per reconnect batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Column linking rows to their managed system. Null means orphaned.
    #[serde(default = "default_owner_column")]
    pub owner_column: String,
    /// Tells this collection's rows apart in a shared table.
    #[serde(default)]
    pub discriminator: Option<Discriminator>,
    /// Join path for targeted refreshes.
    #[serde(default)]
    pub scope: Option<ScopeDefinition>,
    /// Same-collection reference linked after save.
    #[serde(default)]
    pub self_reference: Option<SelfReference>,
    /// Behaviour hooks.
    #[serde(skip)]
    pub hooks: Hooks,
}

impl Descriptor {
    /// Creates a descriptor with default settings.
    pub fn new(
        entity_type: impl Into<String>,
        table: impl Into<String>,
        natural_key: Vec<KeyAttribute>,
    ) -> Self {
        let entity_type = entity_type.into();
        Self {
            association: entity_type.clone(),
            entity_type,
            table: table.into(),
            natural_key,
            parent_collections: Vec::new(),
            attributes: BTreeSet::new(),
            attribute_blacklist: BTreeSet::new(),
            default_attributes: BTreeMap::new(),
            reference_columns: BTreeMap::new(),
            save_strategy: SaveStrategy::Default,
            strategy: None,
            reconnect_eligible: false,
            change_detection: true,
            batch_size: DEFAULT_BATCH_SIZE,
            owner_column: default_owner_column(),
            discriminator: None,
            scope: None,
            self_reference: None,
            hooks: Hooks::default(),
        }
    }

    /// Sets the association name.
    #[must_use]
    pub fn with_association(mut self, association: impl Into<String>) -> Self {
        self.association = association.into();
        self
    }

    /// Sets the parent collections.
    #[must_use]
    pub fn with_parents(mut self, parents: &[&str]) -> Self {
        self.parent_collections = parents.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Sets the allowed inventory attributes.
    #[must_use]
    pub fn with_attributes(mut self, names: &[&str]) -> Self {
        self.attributes = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    /// Sets the attribute blacklist.
    #[must_use]
    pub fn with_blacklist(mut self, names: &[&str]) -> Self {
        self.attribute_blacklist = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    /// Adds a default attribute.
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, default: DefaultAttribute) -> Self {
        self.default_attributes.insert(name.into(), default);
        self
    }

    /// Sets the save strategy tag.
    #[must_use]
    pub fn with_save_strategy(mut self, strategy: SaveStrategy) -> Self {
        self.save_strategy = strategy;
        self
    }

    /// Marks the collection as reconnect-eligible.
    #[must_use]
    pub fn reconnectable(mut self) -> Self {
        self.reconnect_eligible = true;
        self
    }

    /// Sets change detection.
    #[must_use]
    pub fn with_change_detection(mut self, enabled: bool) -> Self {
        self.change_detection = enabled;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the owner column.
    #[must_use]
    pub fn with_owner_column(mut self, column: impl Into<String>) -> Self {
        self.owner_column = column.into();
        self
    }

    /// Sets the discriminator.
    #[must_use]
    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    /// Sets the scope definition.
    #[must_use]
    pub fn with_scope(mut self, scope: ScopeDefinition) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Sets the self reference.
    #[must_use]
    pub fn with_self_reference(mut self, reference: SelfReference) -> Self {
        self.self_reference = Some(reference);
        self
    }

    /// Sets the behaviour hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// First natural key component.
    pub fn first_key(&self) -> Option<&KeyAttribute> {
        self.natural_key.first()
    }

    /// Key attribute named `name`, if any.
    pub fn key_attribute(&self, name: &str) -> Option<&KeyAttribute> {
        self.natural_key.iter().find(|k| k.name() == name)
    }

    /// Column receiving the row id of an object referenced by `attribute`.
    pub fn reference_column(&self, attribute: &str) -> String {
        if let Some(KeyAttribute::Reference { column, .. }) = self.key_attribute(attribute) {
            return column.clone();
        }
        self.reference_columns
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| format!("{attribute}_id"))
    }

    /// Whether an inventory object may carry `name`.
    pub fn allows_attribute(&self, name: &str) -> bool {
        self.attributes.is_empty()
            || self.attributes.contains(name)
            || self.default_attributes.contains_key(name)
            || self.key_attribute(name).is_some()
            || self
                .self_reference
                .as_ref()
                .is_some_and(|r| r.parent_key_attribute == name)
    }

    /// Builds an inventory object of this collection.
    ///
    /// Defaults are applied for absent attributes and the natural key is
    /// recorded in unresolved form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAttribute`] for attributes outside the
    /// collection's inventory attributes.
    pub fn build_object<K, V, I>(&self, ctx: &BuildContext, attributes: I) -> CoreResult<Arc<InventoryObject>>
    where
        K: Into<String>,
        V: Into<AttributeValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut attrs = BTreeMap::new();
        for (name, value) in attributes {
            let name = name.into();
            if !self.allows_attribute(&name) {
                return Err(CoreError::UnknownAttribute {
                    entity_type: self.entity_type.clone(),
                    attribute: name,
                });
            }
            attrs.insert(name, value.into());
        }
        for (name, default) in &self.default_attributes {
            attrs
                .entry(name.clone())
                .or_insert_with(|| AttributeValue::Value(default.evaluate(ctx)));
        }

        let natural_key = self
            .natural_key
            .iter()
            .map(|k| attrs.get(k.name()).map(AttributeValue::key_value).unwrap_or_default())
            .collect();

        Ok(Arc::new(InventoryObject::new(
            self.entity_type.clone(),
            natural_key,
            attrs,
        )))
    }

    /// Checks the descriptor's own consistency.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDescriptor`] describing the first problem.
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |message: &str| Err(CoreError::invalid_descriptor(&self.entity_type, message));

        if self.entity_type.is_empty() {
            return invalid("entity type must not be empty");
        }
        if self.table.is_empty() {
            return invalid("table must not be empty");
        }
        if self.natural_key.is_empty() {
            return invalid("natural key must not be empty");
        }
        if self.natural_key.iter().any(|k| k.name().is_empty() || k.column().is_empty()) {
            return invalid("natural key attributes must be named");
        }
        if self.batch_size == 0 {
            return invalid("batch size must be greater than zero");
        }
        if self.reconnect_eligible && self.owner_column.is_empty() {
            return invalid("reconnect-eligible collections need an owner column");
        }
        if let Some(scope) = &self.scope {
            if scope.path.is_empty() || scope.key_column.is_empty() {
                return invalid("scope definition needs a join path and key column");
            }
            if self.parent_collections.is_empty() {
                return invalid("scope definition without parent collections");
            }
        }
        if let Some(reference) = &self.self_reference {
            if reference.parent_key_attribute.is_empty()
                || reference.lookup_column.is_empty()
                || reference.foreign_key.is_empty()
            {
                return invalid("self reference columns must be named");
            }
        }
        Ok(())
    }
}
