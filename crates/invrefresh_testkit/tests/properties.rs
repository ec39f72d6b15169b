//! Property tests of whole refresh passes.
//!
//! These tests exercise the reconciler through the testkit harness with
//! generated fleets of stored and fetched VMs.

use invrefresh_core::{
    infra_registry, AttributeValue, DefaultAttribute, DescriptorOverrides, KnownKeys, ReconcileConfig,
    Registry, ScopeResolver,
};
use invrefresh_storage::{RecordId, RecordQuery, RecordStore};
use invrefresh_testkit::prelude::*;
use invrefresh_value::{attributes, Value};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Seeds the rows a fleet describes, returning ids by reference.
fn seed(inventory: &TestInventory, fleet: &Fleet) -> BTreeMap<String, RecordId> {
    let mut ids = BTreeMap::new();
    for r in &fleet.orphaned {
        ids.insert(r.clone(), inventory.orphan_vm(r));
    }
    for r in &fleet.owned {
        ids.insert(r.clone(), inventory.owned_vm(r, MANAGER_ID));
    }
    for r in &fleet.stray {
        ids.insert(r.clone(), inventory.orphan_vm(r));
    }
    ids
}

/// Every row of `vms` as (id, ems_ref, owner).
fn snapshot(inventory: &TestInventory) -> Vec<(RecordId, Value, Value)> {
    inventory
        .rows("vms")
        .into_iter()
        .map(|row| (row.id, row.get("ems_ref").clone(), row.get("ems_id").clone()))
        .collect()
}

/// VMs as catalogued, plus hardwares made reconnect-eligible.
fn reconnectable_hardwares() -> Registry {
    let catalog = infra_registry().unwrap();
    let mut registry = Registry::new();
    registry
        .register((*catalog.lookup("vms").unwrap()).clone())
        .unwrap();
    registry
        .register(
            catalog
                .specialize(
                    "hardwares",
                    DescriptorOverrides::new()
                        .reconnect_eligible(true)
                        .default_attribute("ems_id", DefaultAttribute::ManagerId),
                )
                .unwrap(),
        )
        .unwrap();
    registry
}

fn refresh_with_batch_size(fleet: &Fleet, batch_size: usize) -> Vec<(RecordId, Value, Value)> {
    let inventory = TestInventory::with_config(ReconcileConfig::new().batch_size(batch_size));
    seed(&inventory, fleet);
    RefreshHarness::new(&inventory).refresh("vms", inventory.vms(&fleet.fetched));
    snapshot(&inventory)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn batch_size_does_not_change_outcome(fleet in fleet_strategy(40), batch_size in batch_size_strategy()) {
        let baseline = refresh_with_batch_size(&fleet, 100);
        prop_assert_eq!(&refresh_with_batch_size(&fleet, 1), &baseline);
        prop_assert_eq!(&refresh_with_batch_size(&fleet, 10_000), &baseline);
        prop_assert_eq!(&refresh_with_batch_size(&fleet, batch_size), &baseline);
    }

    #[test]
    fn every_matching_orphan_is_reclaimed_once(fleet in fleet_strategy(40)) {
        let inventory = TestInventory::new();
        let ids = seed(&inventory, &fleet);
        let outcome = RefreshHarness::new(&inventory).refresh("vms", inventory.vms(&fleet.fetched));

        let reclaimed: BTreeSet<RecordId> =
            outcome.result.updated.union(&outcome.result.reconnected).copied().collect();
        let expected: BTreeSet<RecordId> = fleet.orphaned.iter().map(|r| ids[r]).collect();
        prop_assert_eq!(reclaimed, expected);
        prop_assert!(outcome.result.failures.is_empty());

        // No duplicates: one row per fetched VM, plus untouched strays.
        prop_assert_eq!(inventory.rows("vms").len(), fleet.fetched.len() + fleet.stray.len());
        prop_assert_eq!(inventory.owned_rows("vms").len(), fleet.fetched.len());
        for r in &fleet.stray {
            prop_assert!(inventory.row("vms", ids[r]).get("ems_id").is_null());
        }
        for object in &outcome.objects {
            let key = object.natural_key()[0].as_text().unwrap_or_default().to_string();
            if let Some(id) = ids.get(&key) {
                prop_assert_eq!(object.resolved_id(), Some(*id));
            }
        }
    }

    #[test]
    fn second_reconcile_writes_nothing(fleet in fleet_strategy(30)) {
        let inventory = TestInventory::new();
        seed(&inventory, &fleet);
        RefreshHarness::new(&inventory).refresh("vms", inventory.vms(&fleet.fetched));
        let writes = inventory.store.write_count();

        let mut index = inventory
            .reconciler
            .build_index("vms", inventory.vms(&fleet.fetched))
            .unwrap()
            .index;
        let result = inventory.reconciler.reconcile("vms", &mut index, None).unwrap();

        prop_assert!(result.is_empty());
        prop_assert_eq!(result.unmatched, fleet.fetched.len());
        prop_assert_eq!(inventory.store.write_count(), writes);
    }

    #[test]
    fn null_keys_never_match(fleet in fleet_strategy(20), keyless in 1..5usize) {
        let inventory = TestInventory::new();
        seed(&inventory, &fleet);
        let null_row = inventory
            .store
            .insert("vms", attributes([("ems_ref", Value::Null), ("template", false.into())]))
            .unwrap();

        let mut objects = inventory.vms(&fleet.fetched);
        for i in 0..keyless {
            objects.push(inventory.object("vms", [("name", Value::from(format!("nameless-{i}")))]));
        }
        let outcome = RefreshHarness::new(&inventory).refresh("vms", objects);

        prop_assert_eq!(outcome.excluded, keyless);
        prop_assert!(!outcome.result.updated.contains(&null_row));
        prop_assert!(!outcome.result.reconnected.contains(&null_row));
        prop_assert!(inventory.row("vms", null_row).get("ems_id").is_null());
    }

    #[test]
    fn targeted_scope_covers_known_parents(
        (refs, known) in prop::collection::btree_set(ems_ref_strategy(), 1..20)
            .prop_flat_map(|refs| {
                let refs: Vec<String> = refs.into_iter().collect();
                (Just(refs.clone()), known_subset_strategy(refs))
            })
    ) {
        let inventory = TestInventory::new();
        let mut expected = BTreeSet::new();
        for r in &refs {
            let vm = inventory.owned_vm(r, MANAGER_ID);
            let hardware = inventory
                .store
                .insert("hardwares", attributes([("vm_or_template_id", vm)]))
                .unwrap();
            if known.contains(r) {
                expected.insert(hardware);
            }
        }

        let hardwares = inventory.registry.lookup("hardwares").unwrap();
        let resolution = ScopeResolver::new().resolve(&hardwares, &[KnownKeys::new("vms", known.iter().cloned())]);
        let scoped: BTreeSet<RecordId> = inventory
            .store
            .find(&resolution.scope.apply(RecordQuery::table("hardwares")))
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();

        prop_assert!(scoped.is_superset(&expected));
        prop_assert_eq!(resolution.scope.is_targeted(), !known.is_empty());
    }

    #[test]
    fn targeted_refresh_reclaims_hardware_of_known_vms(
        (refs, known) in prop::collection::btree_set(ems_ref_strategy(), 1..20)
            .prop_flat_map(|refs| {
                let refs: Vec<String> = refs.into_iter().collect();
                (Just(refs.clone()), known_subset_strategy(refs))
            }),
        batch_size in batch_size_strategy()
    ) {
        let inventory = TestInventory::with_registry(
            reconnectable_hardwares().into(),
            ReconcileConfig::new().batch_size(batch_size),
        );
        let mut orphans = BTreeMap::new();
        let mut fetched = Vec::new();
        for r in &refs {
            let row = inventory.owned_vm(r, MANAGER_ID);
            let hardware = inventory
                .store
                .insert("hardwares", attributes([("vm_or_template_id", row)]))
                .unwrap();
            orphans.insert(r.clone(), hardware);
            if known.contains(r) {
                let vm = inventory.vm(r);
                vm.resolve(row).unwrap();
                fetched.push(vm);
            }
        }

        // A targeted refresh only fetches hardware of the known VMs.
        let objects = fetched
            .iter()
            .map(|vm| inventory.object("hardwares", [("vm_or_template", AttributeValue::from(vm))]))
            .collect();
        let known_keys = [KnownKeys::new("vms", known.iter().cloned())];
        let outcome = RefreshHarness::new(&inventory).refresh_targeted("hardwares", objects, &known_keys);

        let expected: BTreeSet<RecordId> = known.iter().map(|r| orphans[r]).collect();
        prop_assert_eq!(&outcome.result.updated, &expected);
        prop_assert!(outcome.result.created.is_empty());
        prop_assert_eq!(outcome.result.unmatched, 0);
        for (r, id) in &orphans {
            let owner = inventory.row("hardwares", *id).get("ems_id").clone();
            prop_assert_eq!(owner.is_null(), !known.contains(r));
        }
    }

    #[test]
    fn snapshot_chains_link_in_any_order(
        order in (1..16usize).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
    ) {
        let inventory = TestInventory::new();
        let uid = |i: usize| format!("snap-{i}");
        let objects: Vec<_> = order
            .iter()
            .map(|&i| {
                let mut attrs = vec![("uid", Value::from(uid(i))), ("uid_ems", format!("ems-{i}").into())];
                if i > 0 {
                    attrs.push(("parent_uid", uid(i - 1).into()));
                }
                inventory.object("snapshots", attrs)
            })
            .collect();

        let harness = RefreshHarness::new(&inventory);
        let outcome = harness.refresh("snapshots", objects);
        let report = harness.link("snapshots", &outcome);
        prop_assert!(report.warnings.is_empty());
        prop_assert_eq!(report.linked.len(), order.len() - 1);

        let by_uid: BTreeMap<Value, RecordId> = inventory
            .rows("snapshots")
            .into_iter()
            .map(|row| (row.get("uid").clone(), row.id))
            .collect();
        for i in 1..order.len() {
            let child = inventory.row("snapshots", by_uid[&Value::from(uid(i))]);
            prop_assert_eq!(child.get("parent_id"), &Value::from(by_uid[&Value::from(uid(i - 1))]));
        }
    }
}

#[test]
fn registry_round_trips_through_config_file() {
    init_tracing();
    let inventory = TestInventory::new();
    let file = registry_config_file(&inventory.registry);

    let loaded = Registry::from_path(file.path()).unwrap();
    let types: Vec<_> = loaded.entity_types().collect();
    assert_eq!(types, inventory.registry.entity_types().collect::<Vec<_>>());
    for entity_type in types {
        let original = inventory.registry.lookup(entity_type).unwrap();
        let reloaded = loaded.lookup(entity_type).unwrap();
        assert_eq!(reloaded.natural_key, original.natural_key);
        assert_eq!(reloaded.reconnect_eligible, original.reconnect_eligible);
        assert_eq!(reloaded.discriminator, original.discriminator);
    }
}

#[test]
fn hand_written_registry_file_loads() {
    let file = json_file(&serde_json::json!({
        "descriptors": [{
            "entity_type": "hosts",
            "table": "hosts",
            "natural_key": [{"kind": "scalar", "name": "ems_ref"}],
            "default_attributes": {"ems_id": "manager_id"},
            "reconnect_eligible": true
        }]
    }));
    let registry = Registry::from_path(file.path()).unwrap();
    let hosts = registry.lookup("hosts").unwrap();
    assert!(hosts.reconnect_eligible);
    assert_eq!(hosts.association, "hosts");

    let inventory = TestInventory::with_registry(registry.into(), ReconcileConfig::default());
    let row = inventory.store.insert("hosts", attributes([("ems_ref", "h-1")])).unwrap();
    let host = inventory.object("hosts", [("ems_ref", Value::from("h-1"))]);
    let outcome = RefreshHarness::new(&inventory).refresh("hosts", vec![host]);
    assert!(outcome.result.updated.contains(&row));
    assert_eq!(inventory.row("hosts", row).get("ems_id"), &Value::from(MANAGER_ID));
}
