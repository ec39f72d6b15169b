//! Property-based test generators using proptest.
//!
//! Provides strategies for generating fleets of fetched and stored VMs
//! that keep natural keys unique.

use proptest::prelude::*;
use std::collections::BTreeSet;

/// A generated refresh scenario over the `vms` collection.
#[derive(Debug, Clone)]
pub struct Fleet {
    /// References of the VMs fetched from the managed system, shuffled.
    pub fetched: Vec<String>,
    /// Fetched references that also exist as orphaned rows.
    pub orphaned: Vec<String>,
    /// Orphaned rows no fetched VM refers to.
    pub stray: Vec<String>,
    /// Fetched references already owned by the manager.
    pub owned: Vec<String>,
}

/// Strategy for generating VM references.
pub fn ems_ref_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("vm-[a-z0-9]{1,8}").expect("Invalid regex")
}

/// Strategy for generating batch sizes, biased towards the edges.
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), Just(100), Just(10_000), 2..64usize]
}

/// Strategy for generating a fleet with up to `max` fetched VMs.
///
/// Orphaned and owned references are disjoint subsets of the fetched ones;
/// stray references never collide with fetched ones.
pub fn fleet_strategy(max: usize) -> impl Strategy<Value = Fleet> {
    prop::collection::btree_set(ems_ref_strategy(), 0..=max)
        .prop_flat_map(|refs| {
            let refs: Vec<String> = refs.into_iter().collect();
            let n = refs.len();
            (
                Just(refs.clone()).prop_shuffle(),
                prop::sample::subsequence(refs, 0..=n),
                prop::collection::btree_set("stray-[0-9]{1,4}", 0..4),
                any::<prop::sample::Index>(),
            )
        })
        .prop_map(|(fetched, claimed, stray, split)| {
            // Split the claimed refs into orphaned rows and rows this
            // manager already owns.
            let at = split.index(claimed.len() + 1);
            let (orphaned, owned) = claimed.split_at(at);
            Fleet {
                fetched,
                orphaned: orphaned.to_vec(),
                stray: stray.into_iter().collect(),
                owned: owned.to_vec(),
            }
        })
}

/// Strategy for generating a set of known parent keys drawn from `refs`.
pub fn known_subset_strategy(refs: Vec<String>) -> impl Strategy<Value = BTreeSet<String>> {
    let n = refs.len();
    prop::sample::subsequence(refs, 0..=n).prop_map(|keys| keys.into_iter().collect())
}
