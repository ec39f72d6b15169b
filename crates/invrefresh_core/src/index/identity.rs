//! Paired object and attribute indexes.

use super::key::CompositeKey;
use crate::object::InventoryObject;
use invrefresh_value::AttributeMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One indexed object with its pending attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The fetched object.
    pub object: Arc<InventoryObject>,
    /// Attributes to write to its row.
    pub attributes: AttributeMap,
}

/// Index of fetched objects by composite natural key.
///
/// Objects and their pending attributes are kept in one map so an entry can
/// never be removed from one side only. Keys iterate in sorted order.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    entries: BTreeMap<CompositeKey, IndexEntry>,
}

impl IdentityIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `key`, returning the old one.
    pub fn insert(
        &mut self,
        key: CompositeKey,
        object: Arc<InventoryObject>,
        attributes: AttributeMap,
    ) -> Option<IndexEntry> {
        self.entries.insert(key, IndexEntry { object, attributes })
    }

    /// Removes an entry from both indexes at once.
    pub fn take(&mut self, key: &CompositeKey) -> Option<IndexEntry> {
        self.entries.remove(key)
    }

    /// Whether `key` is indexed.
    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// The object indexed under `key`.
    pub fn object(&self, key: &CompositeKey) -> Option<&Arc<InventoryObject>> {
        self.entries.get(key).map(|e| &e.object)
    }

    /// The pending attributes indexed under `key`.
    pub fn attributes(&self, key: &CompositeKey) -> Option<&AttributeMap> {
        self.entries.get(key).map(|e| &e.attributes)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &CompositeKey> {
        self.entries.keys()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &IndexEntry)> {
        self.entries.iter()
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for IdentityIndex {
    type Item = (CompositeKey, IndexEntry);
    type IntoIter = std::collections::btree_map::IntoIter<CompositeKey, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
