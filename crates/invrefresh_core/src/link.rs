//! Post-save cross-reference linking.
//!
//! Some collections reference rows of their own collection (a snapshot's
//! parent snapshot). Those links can only be written once every row has
//! an id, so they are resolved in a separate pass after saving.

use crate::descriptor::Descriptor;
use crate::error::{CoreError, CoreResult};
use crate::object::InventoryObject;
use invrefresh_storage::{Filter, RecordId, RecordQuery, RecordStore, StorageError};
use invrefresh_value::{AttributeMap, Value};
use std::sync::Arc;
use thiserror::Error;

/// Non-fatal problems found while linking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkWarning {
    /// The parent row does not exist; the link was cleared.
    #[error("parent {parent_key} of {child} not found")]
    ParentNotFound {
        /// Child row.
        child: RecordId,
        /// Parent key looked up.
        parent_key: Value,
    },
    /// The object has no persisted identity; nothing was written.
    #[error("object {natural_key} has not been saved")]
    Unsaved {
        /// Natural key of the object.
        natural_key: Value,
    },
}

/// A child row whose link could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    /// Child row.
    pub record_id: RecordId,
    /// Store diagnostic.
    pub message: String,
}

/// Outcome of a linking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Child and parent rows linked.
    pub linked: Vec<(RecordId, RecordId)>,
    /// Rows whose link already had the right value.
    pub unchanged: usize,
    /// Objects without a parent key.
    pub skipped: usize,
    /// Links whose parent key matched more than one row.
    pub ambiguous: usize,
    /// Non-fatal problems.
    pub warnings: Vec<LinkWarning>,
    /// Failed writes.
    pub failures: Vec<LinkFailure>,
}

enum LinkOutcome {
    Linked(RecordId),
    Unchanged,
    ParentMissing,
}

/// Writes same-collection foreign keys after save.
pub struct Linker<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> Linker<'a> {
    /// Creates a linker over `store`.
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Links every saved object to its parent row.
    ///
    /// Each object is handled in its own transaction: the parent row is
    /// looked up by key in the store and its id written to the child's
    /// foreign key. A missing parent clears the foreign key. Objects are
    /// resolved by key, so their order does not matter.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDescriptor`] if the collection has no
    /// self reference, or a storage error if the store becomes unavailable.
    /// Row-level write failures are reported in the [`LinkReport`].
    #[tracing::instrument(skip_all, fields(entity_type = %descriptor.entity_type, objects = saved.len()))]
    pub fn link(&self, descriptor: &Descriptor, saved: &[Arc<InventoryObject>]) -> CoreResult<LinkReport> {
        let Some(reference) = &descriptor.self_reference else {
            return Err(CoreError::invalid_descriptor(
                &descriptor.entity_type,
                "collection has no self reference",
            ));
        };

        let mut report = LinkReport::default();
        for object in saved {
            let parent_key = match object.value(&reference.parent_key_attribute) {
                Some(value) if !value.is_null() => value.clone(),
                _ => {
                    report.skipped += 1;
                    continue;
                }
            };
            let Some(child) = object.resolved_id() else {
                report.warnings.push(LinkWarning::Unsaved {
                    natural_key: Value::Array(object.natural_key().to_vec()),
                });
                continue;
            };

            let mut outcome = LinkOutcome::Unchanged;
            let mut candidates = 0;
            let written = self.store.transaction(&mut |txn| {
                let parents = txn.find(
                    &RecordQuery::table(&descriptor.table)
                        .filter(Filter::Eq(reference.lookup_column.clone(), parent_key.clone())),
                )?;
                candidates = parents.len();
                // Rows come back in id order; the lowest id wins.
                let parent = parents.first().map(|row| row.id);
                let row = txn
                    .get(&descriptor.table, child)?
                    .ok_or_else(|| StorageError::record_not_found(&descriptor.table, child))?;

                let target = parent.map(Value::from).unwrap_or_default();
                let up_to_date = row.get(&reference.foreign_key) == &target;
                outcome = match parent {
                    None => LinkOutcome::ParentMissing,
                    Some(_) if up_to_date => LinkOutcome::Unchanged,
                    Some(parent) => LinkOutcome::Linked(parent),
                };
                if up_to_date {
                    return Ok(());
                }
                let mut changes = AttributeMap::new();
                changes.insert(reference.foreign_key.clone(), target);
                txn.update(&descriptor.table, child, &changes)
            });

            if written.is_ok() && candidates > 1 {
                tracing::warn!(
                    record_id = %child,
                    parent_key = %parent_key,
                    candidates,
                    "parent key matches several rows"
                );
                report.ambiguous += 1;
            }
            match written {
                Ok(()) => match outcome {
                    LinkOutcome::Linked(parent) => report.linked.push((child, parent)),
                    LinkOutcome::Unchanged => report.unchanged += 1,
                    LinkOutcome::ParentMissing => {
                        tracing::warn!(record_id = %child, parent_key = %parent_key, "parent row not found");
                        report.warnings.push(LinkWarning::ParentNotFound { child, parent_key });
                    }
                },
                Err(err) if err.is_row_level() => {
                    tracing::warn!(record_id = %child, error = %err, "failed to link row");
                    report.failures.push(LinkFailure {
                        record_id: child,
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(
            linked = report.linked.len(),
            unchanged = report.unchanged,
            warnings = report.warnings.len(),
            failed = report.failures.len(),
            "cross references linked"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::infra_registry;
    use crate::BuildContext;
    use invrefresh_storage::InMemoryStore;
    use invrefresh_value::attributes;

    struct Fixture {
        store: InMemoryStore,
        descriptor: Arc<Descriptor>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
                descriptor: infra_registry().unwrap().lookup("snapshots").unwrap(),
            }
        }

        /// Saves a snapshot row and returns its resolved object.
        fn saved(&self, uid: &str, parent_uid: Option<&str>) -> Arc<InventoryObject> {
            let mut attrs = vec![("uid", Value::from(uid)), ("uid_ems", format!("ems-{uid}").into())];
            if let Some(parent) = parent_uid {
                attrs.push(("parent_uid", parent.into()));
            }
            let object = self
                .descriptor
                .build_object(&BuildContext::default(), attrs.clone())
                .unwrap();
            let id = self
                .store
                .insert("snapshots", attributes(attrs))
                .unwrap();
            object.resolve(id).unwrap();
            object
        }

        fn parent_of(&self, object: &InventoryObject) -> Value {
            self.store
                .get("snapshots", object.resolved_id().unwrap())
                .unwrap()
                .unwrap()
                .get("parent_id")
                .clone()
        }
    }

    #[test]
    fn links_children_regardless_of_order() {
        let fx = Fixture::new();
        let child = fx.saved("snap-2", Some("snap-1"));
        let root = fx.saved("snap-1", None);

        let report = Linker::new(&fx.store)
            .link(&fx.descriptor, &[Arc::clone(&child), Arc::clone(&root)])
            .unwrap();

        assert_eq!(
            report.linked,
            vec![(child.resolved_id().unwrap(), root.resolved_id().unwrap())]
        );
        assert_eq!(report.skipped, 1);
        assert_eq!(fx.parent_of(&child), Value::from(root.resolved_id().unwrap()));
    }

    #[test]
    fn missing_parent_clears_link() {
        let fx = Fixture::new();
        let orphan = fx.saved("snap-9", Some("snap-gone"));
        fx.store
            .transaction(&mut |txn| {
                txn.update("snapshots", orphan.resolved_id().unwrap(), &attributes([("parent_id", 77i64)]))
            })
            .unwrap();

        let report = Linker::new(&fx.store).link(&fx.descriptor, &[Arc::clone(&orphan)]).unwrap();

        assert!(report.linked.is_empty());
        assert!(matches!(
            &report.warnings[..],
            [LinkWarning::ParentNotFound { parent_key, .. }] if parent_key == &Value::from("snap-gone")
        ));
        assert!(fx.parent_of(&orphan).is_null());
    }

    #[test]
    fn unsaved_objects_are_reported() {
        let fx = Fixture::new();
        let unsaved = fx
            .descriptor
            .build_object(&BuildContext::default(), [("uid", "snap-3"), ("parent_uid", "snap-1")])
            .unwrap();

        let report = Linker::new(&fx.store).link(&fx.descriptor, &[unsaved]).unwrap();
        assert_eq!(
            report.warnings,
            vec![LinkWarning::Unsaved {
                natural_key: Value::Array(vec!["snap-3".into()])
            }]
        );
        assert_eq!(fx.store.write_count(), 0);
    }

    #[test]
    fn second_run_changes_nothing() {
        let fx = Fixture::new();
        let root = fx.saved("snap-1", None);
        let child = fx.saved("snap-2", Some("snap-1"));
        let saved = [root, child];

        Linker::new(&fx.store).link(&fx.descriptor, &saved).unwrap();
        let writes = fx.store.write_count();
        let report = Linker::new(&fx.store).link(&fx.descriptor, &saved).unwrap();

        assert!(report.linked.is_empty());
        assert_eq!(report.unchanged, 1);
        assert_eq!(fx.store.write_count(), writes);
    }

    #[test]
    fn write_failures_are_isolated() {
        let fx = Fixture::new();
        let root = fx.saved("snap-1", None);
        let bad = fx.saved("snap-2", Some("snap-1"));
        let good = fx.saved("snap-3", Some("snap-1"));
        fx.store.reject_writes("snapshots", bad.resolved_id().unwrap());

        let report = Linker::new(&fx.store)
            .link(&fx.descriptor, &[root, Arc::clone(&bad), Arc::clone(&good)])
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].record_id, bad.resolved_id().unwrap());
        assert_eq!(report.linked.len(), 1);
        assert!(!fx.parent_of(&good).is_null());
    }

    #[test]
    fn parent_found_by_natural_key_only() {
        let fx = Fixture::new();
        let ctx = BuildContext::default();
        let root = fx.descriptor.build_object(&ctx, [("uid", "s1")]).unwrap();
        let child = fx
            .descriptor
            .build_object(&ctx, [("uid", "s2"), ("parent_uid", "s1")])
            .unwrap();
        for object in [&root, &child] {
            let id = fx.store.insert("snapshots", object.plain_attributes()).unwrap();
            object.resolve(id).unwrap();
        }

        let report = Linker::new(&fx.store)
            .link(&fx.descriptor, &[Arc::clone(&child), Arc::clone(&root)])
            .unwrap();

        assert!(report.warnings.is_empty());
        assert_eq!(fx.parent_of(&child), Value::from(root.resolved_id().unwrap()));
    }

    #[test]
    fn ambiguous_parent_key_uses_lowest_id() {
        let fx = Fixture::new();
        let first = fx.saved("snap-1", None);
        let second = fx.saved("snap-1", None);
        let child = fx.saved("snap-2", Some("snap-1"));

        let report = Linker::new(&fx.store).link(&fx.descriptor, &[Arc::clone(&child)]).unwrap();

        assert_eq!(report.ambiguous, 1);
        assert!(first.resolved_id() < second.resolved_id());
        assert_eq!(fx.parent_of(&child), Value::from(first.resolved_id().unwrap()));
    }

    #[test]
    fn requires_self_reference() {
        let fx = Fixture::new();
        let vms = infra_registry().unwrap().lookup("vms").unwrap();
        assert!(matches!(
            Linker::new(&fx.store).link(&vms, &[]),
            Err(CoreError::InvalidDescriptor { .. })
        ));
    }
}
