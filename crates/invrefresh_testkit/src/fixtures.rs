//! Test fixtures and inventory helpers.
//!
//! Provides an in-memory store wired to the infrastructure registry, plus
//! shortcuts for seeding rows and building fetched objects.

use invrefresh_core::{
    infra_registry, AttributeValue, BuildContext, InventoryObject, ReconcileConfig, Reconciler,
    Registry, RegistryConfig,
};
use invrefresh_storage::{InMemoryStore, Record, RecordId, RecordQuery, RecordStore};
use invrefresh_value::{attributes, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Manager id used by fixtures unless told otherwise.
pub const MANAGER_ID: RecordId = RecordId::new(1_000);

/// An in-memory inventory with a reconciler over it.
pub struct TestInventory {
    /// The store holding the rows.
    pub store: Arc<InMemoryStore>,
    /// Registry shared with the reconciler.
    pub registry: Arc<Registry>,
    /// Reconciler over `store`.
    pub reconciler: Reconciler,
}

impl TestInventory {
    /// Creates an empty inventory with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ReconcileConfig::default())
    }

    /// Creates an empty inventory with the given configuration.
    pub fn with_config(config: ReconcileConfig) -> Self {
        let registry = Arc::new(infra_registry().expect("Failed to build registry"));
        Self::with_registry(registry, config)
    }

    /// Creates an empty inventory over a custom registry.
    pub fn with_registry(registry: Arc<Registry>, config: ReconcileConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = Reconciler::with_config(Arc::clone(&registry), store.clone(), config)
            .expect("Invalid reconcile config");
        Self {
            store,
            registry,
            reconciler,
        }
    }

    /// Inserts a VM row with no owning manager.
    pub fn orphan_vm(&self, ems_ref: &str) -> RecordId {
        self.store
            .insert(
                "vms",
                attributes([
                    ("ems_ref", Value::from(ems_ref)),
                    ("name", format!("orphan {ems_ref}").into()),
                    ("template", false.into()),
                ]),
            )
            .expect("Failed to insert orphan")
    }

    /// Inserts a VM row owned by `manager`.
    pub fn owned_vm(&self, ems_ref: &str, manager: RecordId) -> RecordId {
        self.store
            .insert(
                "vms",
                attributes([
                    ("ems_ref", Value::from(ems_ref)),
                    ("ems_id", manager.into()),
                    ("template", false.into()),
                ]),
            )
            .expect("Failed to insert owned VM")
    }

    /// Builds a fetched VM owned by [`MANAGER_ID`].
    pub fn vm(&self, ems_ref: &str) -> Arc<InventoryObject> {
        self.object("vms", [("ems_ref", Value::from(ems_ref)), ("name", ems_ref.into())])
    }

    /// Builds fetched VMs for every reference.
    pub fn vms<S: AsRef<str>>(&self, refs: &[S]) -> Vec<Arc<InventoryObject>> {
        refs.iter().map(|r| self.vm(r.as_ref())).collect()
    }

    /// Builds a fetched object of any registered type, owned by [`MANAGER_ID`].
    pub fn object<I, V>(&self, entity_type: &str, attrs: I) -> Arc<InventoryObject>
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<AttributeValue>,
    {
        self.registry
            .lookup(entity_type)
            .expect("Unknown entity type")
            .build_object(&BuildContext::for_manager(MANAGER_ID), attrs)
            .expect("Failed to build object")
    }

    /// Reads a row, panicking if it does not exist.
    pub fn row(&self, table: &str, id: RecordId) -> Record {
        self.store
            .get(table, id)
            .expect("Failed to read row")
            .expect("Row not found")
    }

    /// All rows of a table.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.store
            .find(&RecordQuery::table(table))
            .expect("Failed to read table")
    }

    /// Rows of a table owned by [`MANAGER_ID`].
    pub fn owned_rows(&self, table: &str) -> Vec<Record> {
        self.rows(table)
            .into_iter()
            .filter(|row| row.get("ems_id") == &Value::from(MANAGER_ID))
            .collect()
    }
}

impl Default for TestInventory {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a fresh in-memory inventory.
///
/// # Example
///
/// ```rust
/// use invrefresh_testkit::with_test_inventory;
///
/// with_test_inventory(|inventory| {
///     inventory.orphan_vm("vm-1");
///     assert_eq!(inventory.rows("vms").len(), 1);
/// });
/// ```
pub fn with_test_inventory<F, R>(f: F) -> R
where
    F: FnOnce(&TestInventory) -> R,
{
    let inventory = TestInventory::new();
    f(&inventory)
}

/// Writes a registry as a JSON config file.
///
/// The file is deleted when the returned handle is dropped.
pub fn registry_config_file(registry: &Registry) -> NamedTempFile {
    let config = RegistryConfig {
        descriptors: registry
            .entity_types()
            .map(|t| (*registry.lookup(t).expect("Registered type")).clone())
            .collect(),
    };
    let json = config.to_json().expect("Failed to serialize registry");
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(json.as_bytes())
        .expect("Failed to write registry config");
    file
}

/// Writes raw JSON to a temporary file.
pub fn json_file(value: &serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    serde_json::to_writer_pretty(&mut file, value).expect("Failed to write JSON");
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_and_owned_rows() {
        let inventory = TestInventory::new();
        inventory.orphan_vm("vm-1");
        inventory.owned_vm("vm-2", MANAGER_ID);
        inventory.owned_vm("vm-3", RecordId::new(5));

        assert_eq!(inventory.rows("vms").len(), 3);
        assert_eq!(inventory.owned_rows("vms").len(), 1);
    }

    #[test]
    fn fetched_vm_is_owned() {
        let inventory = TestInventory::new();
        let vm = inventory.vm("vm-1");
        assert_eq!(vm.value("ems_id"), Some(&Value::from(MANAGER_ID)));
        assert_eq!(vm.natural_key(), &[Value::from("vm-1")]);
    }

    #[test]
    fn registry_file_loads_back() {
        let inventory = TestInventory::new();
        let file = registry_config_file(&inventory.registry);
        let loaded = Registry::from_path(file.path()).unwrap();
        assert_eq!(loaded.len(), inventory.registry.len());
    }
}
