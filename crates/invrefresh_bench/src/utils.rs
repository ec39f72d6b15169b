//! Benchmark utilities.

use invrefresh_core::{BuildContext, Descriptor, InventoryObject};
use invrefresh_storage::{InMemoryStore, RecordId, RecordStore};
use invrefresh_value::{attributes, Value};
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Manager id the benchmarks refresh as.
pub const BENCH_MANAGER: RecordId = RecordId::new(1);

/// Generate `count` distinct VM references in random order.
pub fn shuffled_refs(count: usize) -> Vec<String> {
    let mut refs: Vec<String> = (0..count).map(|i| format!("vm-{i:06}")).collect();
    refs.shuffle(&mut rand::thread_rng());
    refs
}

/// Seed an orphaned VM row for every reference.
pub fn seed_orphans(store: &InMemoryStore, refs: &[String]) {
    for r in refs {
        store
            .insert(
                "vms",
                attributes([("ems_ref", Value::from(r.as_str())), ("template", false.into())]),
            )
            .expect("Failed to seed orphan");
    }
}

/// Build fetched VMs for every reference.
pub fn fetched_vms(vms: &Descriptor, refs: &[String]) -> Vec<Arc<InventoryObject>> {
    let ctx = BuildContext::for_manager(BENCH_MANAGER);
    refs.iter()
        .map(|r| {
            vms.build_object(&ctx, [("ems_ref", r.as_str()), ("name", r.as_str())])
                .expect("Failed to build VM")
        })
        .collect()
}
