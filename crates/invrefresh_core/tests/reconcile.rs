//! Integration tests for reconcile and cross-reference passes.

use invrefresh_core::{
    infra_registry, AttributeValue, BuildContext, CompositeKey, DefaultAttribute, DescriptorOverrides,
    IdentityIndex, InventoryObject, KnownKeys, PersistenceStrategy, ReconcileConfig, Reconciler,
    Registry, ScopeFallback, ScopeResolver,
};
use invrefresh_storage::{InMemoryStore, RecordId, RecordQuery, RecordStore};
use invrefresh_value::{attributes, Value};
use std::sync::Arc;

const MANAGER: RecordId = RecordId::new(7);

struct Harness {
    store: Arc<InMemoryStore>,
    registry: Arc<Registry>,
    reconciler: Reconciler,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ReconcileConfig::default())
    }

    fn with_config(config: ReconcileConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let registry = Arc::new(infra_registry().unwrap());
        let reconciler = Reconciler::with_config(registry.clone(), store.clone(), config).unwrap();
        Self {
            store,
            registry,
            reconciler,
        }
    }

    fn orphan_vm(&self, ems_ref: &str, name: &str) -> RecordId {
        self.store
            .insert(
                "vms",
                attributes([
                    ("ems_ref", Value::from(ems_ref)),
                    ("name", name.into()),
                    ("template", false.into()),
                    ("type", "ManageIQ::Providers::Vmware::InfraManager::Vm".into()),
                ]),
            )
            .unwrap()
    }

    fn vm(&self, ems_ref: &str, name: &str) -> Arc<InventoryObject> {
        self.registry
            .lookup("vms")
            .unwrap()
            .build_object(&BuildContext::for_manager(MANAGER), [("ems_ref", ems_ref), ("name", name)])
            .unwrap()
    }

    fn index(&self, entity_type: &str, objects: Vec<Arc<InventoryObject>>) -> IdentityIndex {
        let build = self.reconciler.build_index(entity_type, objects).unwrap();
        assert!(build.excluded.is_empty());
        build.index
    }

    fn row(&self, table: &str, id: RecordId) -> invrefresh_storage::Record {
        self.store.get(table, id).unwrap().unwrap()
    }
}

#[test]
fn scenario_a_orphaned_vm_is_reclaimed() {
    let h = Harness::new();
    let row = h.orphan_vm("vm-42", "old-name");
    let vm = h.vm("vm-42", "web-1");
    let mut index = h.index("vms", vec![vm.clone()]);

    let result = h.reconciler.reconcile("vms", &mut index, None).unwrap();

    let stored = h.row("vms", row);
    assert_eq!(stored.get("ems_id"), &Value::from(MANAGER));
    assert_eq!(stored.get("name").as_text(), Some("web-1"));
    assert_eq!(
        stored.get("type").as_text(),
        Some("ManageIQ::Providers::Vmware::InfraManager::Vm")
    );
    assert_eq!(vm.resolved_id(), Some(row));
    assert!(!index.contains_key(&CompositeKey::new(vec!["vm-42".into()])));
    assert!(result.updated.contains(&row));
    assert_eq!(result.unmatched, 0);
}

#[test]
fn second_pass_writes_nothing() {
    let h = Harness::new();
    h.orphan_vm("vm-1", "a");
    h.orphan_vm("vm-2", "b");
    let objects = vec![h.vm("vm-1", "a"), h.vm("vm-2", "b2"), h.vm("vm-3", "c")];

    let mut first = h.index("vms", objects.clone());
    h.reconciler.reconcile("vms", &mut first, None).unwrap();
    let writes = h.store.write_count();

    // Rows are owned now, so nothing is orphaned any more.
    let mut second = h.index("vms", objects);
    let result = h.reconciler.reconcile("vms", &mut second, None).unwrap();
    assert_eq!(h.store.write_count(), writes);
    assert!(result.is_empty());
    assert_eq!(second.len(), 3);
}

#[test]
fn templates_and_vms_share_a_table_without_crosstalk() {
    let h = Harness::new();
    let vm_row = h.orphan_vm("ref-1", "vm");
    let template_row = h
        .store
        .insert(
            "vms",
            attributes([("ems_ref", Value::from("ref-1")), ("template", true.into())]),
        )
        .unwrap();

    let template = h
        .registry
        .lookup("miq_templates")
        .unwrap()
        .build_object(&BuildContext::for_manager(MANAGER), [("ems_ref", "ref-1")])
        .unwrap();
    let mut index = h.index("miq_templates", vec![template.clone()]);
    let result = h.reconciler.reconcile("miq_templates", &mut index, None).unwrap();

    assert!(result.updated.contains(&template_row));
    assert_eq!(template.resolved_id(), Some(template_row));
    assert!(h.row("vms", vm_row).get("ems_id").is_null());
}

#[test]
fn unmatched_entries_stay_for_create_path() {
    let h = Harness::new();
    h.orphan_vm("vm-1", "a");
    let fresh = h.vm("vm-9", "new");
    let mut index = h.index("vms", vec![h.vm("vm-1", "a"), fresh.clone()]);

    let result = h.reconciler.reconcile("vms", &mut index, None).unwrap();

    assert_eq!(result.unmatched, 1);
    let remaining = index.object(&CompositeKey::new(vec!["vm-9".into()])).unwrap();
    assert!(Arc::ptr_eq(remaining, &fresh));
    assert_eq!(fresh.resolved_id(), None);

    // The create path reports into the same result type.
    let mut result = result;
    let pending = index.take(&CompositeKey::new(vec!["vm-9".into()])).unwrap();
    let id = h.store.insert("vms", pending.attributes).unwrap();
    fresh.resolve(id).unwrap();
    result.record_created(id);
    assert_eq!(result.created.len(), 1);
}

#[test]
fn null_keyed_objects_never_match() {
    let h = Harness::new();
    h.store
        .insert("vms", attributes([("name", Value::from("nameless")), ("template", false.into())]))
        .unwrap();
    let keyless = h
        .registry
        .lookup("vms")
        .unwrap()
        .build_object(&BuildContext::for_manager(MANAGER), [("name", "nameless")])
        .unwrap();

    let build = h.reconciler.build_index("vms", [keyless]).unwrap();
    assert_eq!(build.excluded.len(), 1);
    let mut index = build.index;
    let result = h.reconciler.reconcile("vms", &mut index, None).unwrap();
    assert!(result.is_empty());
}

#[test]
fn targeted_pass_only_sees_known_parents() {
    let h = Harness::new();
    let vm_a = h
        .store
        .insert("vms", attributes([("ems_ref", Value::from("vm-a")), ("ems_id", MANAGER.into())]))
        .unwrap();
    let vm_b = h
        .store
        .insert("vms", attributes([("ems_ref", Value::from("vm-b")), ("ems_id", MANAGER.into())]))
        .unwrap();
    let hw_a = h
        .store
        .insert("hardwares", attributes([("vm_or_template_id", vm_a)]))
        .unwrap();
    h.store
        .insert("hardwares", attributes([("vm_or_template_id", vm_b)]))
        .unwrap();

    let hardwares = h.registry.lookup("hardwares").unwrap();
    let known = [KnownKeys::new("vms", ["vm-a"])];
    let resolution = ScopeResolver::new().resolve(&hardwares, &known);
    assert_eq!(resolution.fallback, None);

    let scoped = h
        .store
        .find(&resolution.scope.apply(RecordQuery::table("hardwares")))
        .unwrap();
    assert_eq!(scoped.iter().map(|r| r.id).collect::<Vec<_>>(), vec![hw_a]);

    let fallback = ScopeResolver::new().resolve(&hardwares, &[]);
    assert_eq!(fallback.fallback, Some(ScopeFallback::NoKnownKeys));
    assert_eq!(
        h.store
            .find(&fallback.scope.apply(RecordQuery::table("hardwares")))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn targeted_reconnect_with_specialized_descriptor() {
    let h = Harness::new();
    let mut registry = Registry::new();
    let hosts = h
        .registry
        .specialize(
            "hosts",
            DescriptorOverrides::new()
                .strategy(PersistenceStrategy::LocalDbFindReferences)
                .batch_size(1),
        )
        .unwrap();
    registry.register(hosts).unwrap();
    let reconciler = Reconciler::new(Arc::new(registry), h.store.clone());

    let row = h
        .store
        .insert("hosts", attributes([("ems_ref", "host-1")]))
        .unwrap();
    let host = reconciler
        .descriptor("hosts")
        .unwrap()
        .build_object(&BuildContext::for_manager(MANAGER), [("ems_ref", "host-1")])
        .unwrap();
    let mut index = reconciler.build_index("hosts", [host.clone()]).unwrap().index;

    // Hosts have no parent collections, so the targeted pass falls back to
    // the whole table and still reclaims the row.
    let result = reconciler
        .reconcile("hosts", &mut index, Some(&[KnownKeys::new("vms", ["vm-1"])]))
        .unwrap();
    assert!(result.updated.contains(&row));
    assert_eq!(host.resolved_id(), Some(row));
}

#[test]
fn targeted_reconnect_reclaims_only_rows_of_known_parents() {
    let h = Harness::new();
    let mut registry = Registry::new();
    registry
        .register(
            h.registry
                .specialize(
                    "hardwares",
                    DescriptorOverrides::new()
                        .reconnect_eligible(true)
                        .default_attribute("ems_id", DefaultAttribute::ManagerId),
                )
                .unwrap(),
        )
        .unwrap();
    let reconciler = Reconciler::new(Arc::new(registry), h.store.clone());
    let hardwares = reconciler.descriptor("hardwares").unwrap();
    let ctx = BuildContext::for_manager(MANAGER);

    let mut vms = Vec::new();
    let mut orphans = Vec::new();
    for ems_ref in ["vm-a", "vm-b"] {
        let row = h
            .store
            .insert("vms", attributes([("ems_ref", Value::from(ems_ref)), ("ems_id", MANAGER.into())]))
            .unwrap();
        let vm = h.vm(ems_ref, ems_ref);
        vm.resolve(row).unwrap();
        orphans.push(
            h.store
                .insert("hardwares", attributes([("vm_or_template_id", row)]))
                .unwrap(),
        );
        vms.push(vm);
    }
    let objects: Vec<_> = vms
        .iter()
        .map(|vm| {
            hardwares
                .build_object(
                    &ctx,
                    [
                        ("vm_or_template", AttributeValue::from(vm)),
                        ("memory_mb", AttributeValue::from(2048i64)),
                    ],
                )
                .unwrap()
        })
        .collect();
    let mut index = reconciler.build_index("hardwares", objects.clone()).unwrap().index;

    let known = [KnownKeys::from_objects(&h.registry.lookup("vms").unwrap(), &vms[..1])];
    let result = reconciler
        .reconcile("hardwares", &mut index, Some(&known))
        .unwrap();

    assert_eq!(result.updated.iter().copied().collect::<Vec<_>>(), vec![orphans[0]]);
    assert_eq!(result.unmatched, 1);
    assert_eq!(objects[0].resolved_id(), Some(orphans[0]));
    assert_eq!(objects[1].resolved_id(), None);
    let reclaimed = h.row("hardwares", orphans[0]);
    assert_eq!(reclaimed.get("ems_id"), &Value::from(MANAGER));
    assert_eq!(reclaimed.get("memory_mb"), &Value::Integer(2048));
    assert!(h.row("hardwares", orphans[1]).get("ems_id").is_null());

    // A full pass over what is left picks up the other row.
    let result = reconciler.reconcile("hardwares", &mut index, None).unwrap();
    assert!(result.updated.contains(&orphans[1]));
    assert!(index.is_empty());
}

#[test]
fn scenario_b_self_references_link_in_any_order() {
    for reversed in [false, true] {
        let h = Harness::new();
        let snapshots = h.registry.lookup("snapshots").unwrap();
        let ctx = BuildContext::for_manager(MANAGER);
        let x = snapshots
            .build_object(&ctx, [("uid", "s1")])
            .unwrap();
        let y = snapshots
            .build_object(&ctx, [("uid", "s2"), ("uid_ems", "snapshot-2"), ("parent_uid", "s1")])
            .unwrap();

        let mut order = vec![x.clone(), y.clone()];
        if reversed {
            order.reverse();
        }
        for object in &order {
            let id = h.store.insert("snapshots", object.plain_attributes()).unwrap();
            object.resolve(id).unwrap();
        }

        let report = h.reconciler.link_cross_references("snapshots", &order).unwrap();
        assert!(report.warnings.is_empty());

        let y_row = h.row("snapshots", y.resolved_id().unwrap());
        assert_eq!(
            y_row.get("parent_id"),
            &Value::from(x.resolved_id().unwrap()),
            "reversed = {reversed}"
        );
    }
}
