//! Cross-crate integration test helpers.
//!
//! Plays a whole refresh of one collection: index, reconcile, then a
//! minimal save path standing in for the host application's persister.

use crate::fixtures::{TestInventory, MANAGER_ID};
use invrefresh_core::{
    CompositeKey, InventoryObject, KnownKeys, LinkReport, ReconciliationResult,
};
use invrefresh_storage::{Filter, RecordId, RecordQuery, RecordStore};
use invrefresh_value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of [`RefreshHarness::refresh`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// Reconcile result, with the save path's inserts in `created`.
    pub result: ReconciliationResult,
    /// Rows already owned by the manager that the save path rewrote.
    pub saved_existing: Vec<RecordId>,
    /// Objects dropped from the index for a null key component.
    pub excluded: usize,
    /// Every fetched object, resolved unless excluded or failed.
    pub objects: Vec<Arc<InventoryObject>>,
}

/// A test harness running full refresh passes against a [`TestInventory`].
pub struct RefreshHarness<'a> {
    inventory: &'a TestInventory,
}

impl<'a> RefreshHarness<'a> {
    /// Creates a harness over an inventory.
    pub fn new(inventory: &'a TestInventory) -> Self {
        Self { inventory }
    }

    /// Refreshes a collection with a full (untargeted) pass.
    pub fn refresh(&self, entity_type: &str, objects: Vec<Arc<InventoryObject>>) -> RefreshOutcome {
        self.run(entity_type, objects, None)
    }

    /// Refreshes a collection with a pass targeted at known parents.
    pub fn refresh_targeted(
        &self,
        entity_type: &str,
        objects: Vec<Arc<InventoryObject>>,
        known: &[KnownKeys],
    ) -> RefreshOutcome {
        self.run(entity_type, objects, Some(known))
    }

    /// Links the self references of a refreshed collection.
    pub fn link(&self, entity_type: &str, outcome: &RefreshOutcome) -> LinkReport {
        self.inventory
            .reconciler
            .link_cross_references(entity_type, &outcome.objects)
            .expect("Failed to link cross references")
    }

    fn run(
        &self,
        entity_type: &str,
        objects: Vec<Arc<InventoryObject>>,
        known: Option<&[KnownKeys]>,
    ) -> RefreshOutcome {
        let reconciler = &self.inventory.reconciler;
        let descriptor = reconciler.descriptor(entity_type).expect("Unknown entity type");
        let build = reconciler
            .build_index(entity_type, objects.iter().cloned())
            .expect("Failed to build index");
        let excluded = build.excluded.len();
        let mut index = build.index;

        let mut result = reconciler
            .reconcile(entity_type, &mut index, known)
            .expect("Reconcile failed");

        // Rows this manager already owns, by natural key.
        let mut owned: BTreeMap<CompositeKey, RecordId> = BTreeMap::new();
        let mut query = RecordQuery::table(&descriptor.table)
            .filter(Filter::eq(descriptor.owner_column.clone(), MANAGER_ID));
        if let Some(discriminator) = &descriptor.discriminator {
            query = query.filter(discriminator.filter());
        }
        for row in self.inventory.store.find(&query).expect("Failed to load owned rows") {
            if let Some(key) = CompositeKey::for_record(&descriptor, &row) {
                owned.insert(key, row.id);
            }
        }

        let mut saved_existing = Vec::new();
        let keys: Vec<CompositeKey> = index.keys().cloned().collect();
        for key in keys {
            let Some(entry) = index.take(&key) else { continue };
            let id = match owned.get(&key) {
                Some(&id) => {
                    self.inventory
                        .store
                        .transaction(&mut |txn| txn.update(&descriptor.table, id, &entry.attributes))
                        .expect("Failed to save existing row");
                    saved_existing.push(id);
                    id
                }
                None => {
                    let mut attributes = entry.attributes.clone();
                    if let Some(discriminator) = &descriptor.discriminator {
                        attributes
                            .entry(discriminator.column.clone())
                            .or_insert_with(|| discriminator.value.clone());
                    }
                    let id = self
                        .inventory
                        .store
                        .insert(&descriptor.table, attributes)
                        .expect("Failed to insert row");
                    result.record_created(id);
                    id
                }
            };
            entry.object.resolve(id).expect("Object resolved twice");
        }

        RefreshOutcome {
            result,
            saved_existing,
            excluded,
            objects,
        }
    }
}

/// Current value of a column on a row.
pub fn column(inventory: &TestInventory, table: &str, id: RecordId, column: &str) -> Value {
    inventory.row(table, id).get(column).clone()
}
