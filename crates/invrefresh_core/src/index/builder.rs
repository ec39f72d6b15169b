//! Builds an identity index from fetched objects.

use super::identity::IdentityIndex;
use super::key::CompositeKey;
use crate::descriptor::Descriptor;
use crate::error::KeyResolutionError;
use crate::object::{AttributeValue, InventoryObject};
use invrefresh_value::{AttributeMap, Value};
use std::sync::Arc;

/// An object left out of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedObject {
    /// The object, destined for the create path only.
    pub object: Arc<InventoryObject>,
    /// Why it could not be keyed.
    pub error: KeyResolutionError,
}

/// Outcome of [`IndexBuilder::build`].
#[derive(Debug, Default)]
pub struct IndexBuild {
    /// Objects keyed by composite natural key.
    pub index: IdentityIndex,
    /// Objects whose key had a null component.
    pub excluded: Vec<ExcludedObject>,
    /// Number of objects replaced by a later object with the same key.
    pub duplicates: usize,
}

/// Computes keys and pending attributes for one collection.
#[derive(Debug, Clone, Copy)]
pub struct IndexBuilder<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> IndexBuilder<'a> {
    /// Creates a builder for the collection described by `descriptor`.
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }

    /// Attributes to write to an object's row.
    ///
    /// Blacklisted attributes are dropped. References are written to their
    /// column as the referenced row id, or null while it is not persisted.
    pub fn pending_attributes(&self, object: &InventoryObject) -> AttributeMap {
        object
            .attributes()
            .iter()
            .filter(|(name, _)| !self.descriptor.attribute_blacklist.contains(name.as_str()))
            .map(|(name, attr)| match attr {
                AttributeValue::Value(value) => (name.clone(), value.clone()),
                AttributeValue::Reference(target) => (
                    self.descriptor.reference_column(name),
                    target.resolved_id().map(Value::from).unwrap_or_default(),
                ),
            })
            .collect()
    }

    /// Indexes `objects`.
    ///
    /// Objects with a null key component are reported in
    /// [`IndexBuild::excluded`]. When two objects share a key the later one
    /// wins.
    pub fn build<I>(&self, objects: I) -> IndexBuild
    where
        I: IntoIterator<Item = Arc<InventoryObject>>,
    {
        let mut build = IndexBuild::default();
        for object in objects {
            match CompositeKey::for_object(self.descriptor, &object) {
                Ok(key) => {
                    let attributes = self.pending_attributes(&object);
                    if build.index.insert(key, object, attributes).is_some() {
                        build.duplicates += 1;
                    }
                }
                Err(error) => {
                    tracing::debug!(
                        entity_type = %self.descriptor.entity_type,
                        attribute = %error.attribute,
                        "object excluded from identity index"
                    );
                    build.excluded.push(ExcludedObject { object, error });
                }
            }
        }
        if build.duplicates > 0 {
            tracing::debug!(
                entity_type = %self.descriptor.entity_type,
                duplicates = build.duplicates,
                "duplicate natural keys, later objects kept"
            );
        }
        build
    }
}
