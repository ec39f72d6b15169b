//! Reconnect pass.
//!
//! Rows whose owner link is null were left behind when their managed system
//! was removed. If the same system comes back, its objects should reclaim
//! those rows instead of duplicating them. A pass:
//!
//! 1. Counts orphaned rows in scope and stops early when there are none
//! 2. Splits the index keys into batches
//! 3. Queries orphaned rows by the first key column per batch
//! 4. Matches each row by its full composite key, takes the entry out of the
//!    index and writes the changed attributes in a single-row transaction
//!
//! Whatever is left in the index afterwards goes to the create path.

use crate::config::ReconcileConfig;
use crate::descriptor::Descriptor;
use crate::error::{CoreError, CoreResult};
use crate::index::{CompositeKey, IdentityIndex};
use crate::result::ReconciliationResult;
use crate::scope::Scope;
use invrefresh_storage::{Filter, Record, RecordQuery, RecordStore};
use invrefresh_value::{attribute, AttributeMap, Value};

/// Attributes never copied onto a reclaimed row.
const PROTECTED_ATTRIBUTES: [&str; 2] = ["id", "type"];

/// Attributes of `pending` to assign to a row, without protected ones.
pub fn assignable_attributes(pending: &AttributeMap) -> AttributeMap {
    pending
        .iter()
        .filter(|(name, _)| !PROTECTED_ATTRIBUTES.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Attributes of `assignment` whose value differs from the row's.
///
/// Values compare exactly; a missing column equals null.
pub fn changed_attributes(current: &AttributeMap, assignment: &AttributeMap) -> AttributeMap {
    assignment
        .iter()
        .filter(|(name, value)| attribute(current, name) != *value)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Runs reconnect passes against a store.
pub struct ReconnectEngine<'a> {
    store: &'a dyn RecordStore,
    config: &'a ReconcileConfig,
}

impl<'a> ReconnectEngine<'a> {
    /// Creates an engine.
    pub fn new(store: &'a dyn RecordStore, config: &'a ReconcileConfig) -> Self {
        Self { store, config }
    }

    /// Query for orphaned rows of the collection within `scope`.
    pub fn orphan_query(descriptor: &Descriptor, scope: &Scope) -> RecordQuery {
        let mut query = RecordQuery::table(&descriptor.table).filter(Filter::is_null(&descriptor.owner_column));
        if let Some(discriminator) = &descriptor.discriminator {
            query = query.filter(discriminator.filter());
        }
        scope.apply(query)
    }

    /// Reclaims orphaned rows matching entries of `index`.
    ///
    /// Matched entries are removed from the index and their objects get
    /// the row's id. Row write failures are recorded in the result and the
    /// pass continues; their entries stay out of the index.
    ///
    /// # Errors
    ///
    /// Returns an error if counting or querying rows fails, or if the store
    /// becomes unavailable.
    pub fn run(
        &self,
        descriptor: &Descriptor,
        index: &mut IdentityIndex,
        scope: &Scope,
    ) -> CoreResult<ReconciliationResult> {
        let mut result = ReconciliationResult::new(&descriptor.entity_type);
        let Some(first_key) = descriptor.first_key() else {
            return Err(CoreError::invalid_descriptor(
                &descriptor.entity_type,
                "natural key must not be empty",
            ));
        };

        let orphans = Self::orphan_query(descriptor, scope);
        let orphan_count = self.store.count(&orphans)?;
        if orphan_count == 0 || index.is_empty() {
            tracing::debug!(
                entity_type = %descriptor.entity_type,
                orphans = orphan_count,
                "nothing to reconnect"
            );
            result.unmatched = index.len();
            return Ok(result);
        }

        let batch_size = self.config.effective_batch_size(descriptor.batch_size);
        let keys: Vec<CompositeKey> = index.keys().cloned().collect();
        tracing::debug!(
            entity_type = %descriptor.entity_type,
            orphans = orphan_count,
            keys = keys.len(),
            batch_size,
            "reconnecting orphaned rows"
        );

        for (batch, chunk) in keys.chunks(batch_size).enumerate() {
            let mut candidates: Vec<Value> = chunk.iter().filter_map(|k| k.first().cloned()).collect();
            candidates.sort();
            candidates.dedup();

            let query = orphans
                .clone()
                .filter(Filter::any_of(first_key.column(), candidates));
            let rows = self.store.find(&query)?;
            tracing::trace!(batch, rows = rows.len(), "reconnect batch");

            for row in rows {
                self.reconnect_row(descriptor, index, row, &mut result)?;
            }
        }

        result.unmatched = index.len();
        tracing::info!(
            entity_type = %descriptor.entity_type,
            updated = result.updated.len(),
            reconnected = result.reconnected.len(),
            failed = result.failures.len(),
            unmatched = result.unmatched,
            "reconnect pass finished"
        );
        Ok(result)
    }

    fn reconnect_row(
        &self,
        descriptor: &Descriptor,
        index: &mut IdentityIndex,
        row: Record,
        result: &mut ReconciliationResult,
    ) -> CoreResult<()> {
        let Some(key) = CompositeKey::for_record(descriptor, &row) else {
            return Ok(());
        };
        let Some(entry) = index.take(&key) else {
            return Ok(());
        };

        let assignment = assignable_attributes(&entry.attributes);
        let changes = changed_attributes(&row.attributes, &assignment);
        let payload = if descriptor.change_detection {
            changes
        } else {
            assignment
        };

        if descriptor.change_detection && payload.is_empty() {
            result.record_reconnected(row.id);
        } else {
            let written = self
                .store
                .transaction(&mut |txn| txn.update(&descriptor.table, row.id, &payload));
            match written {
                Ok(()) => result.record_updated(row.id),
                Err(err) if err.is_row_level() => {
                    tracing::warn!(
                        entity_type = %descriptor.entity_type,
                        record_id = %row.id,
                        key = %key,
                        error = %err,
                        "failed to reconnect row"
                    );
                    result.record_failure(row.id, key, err.to_string());
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }

        if let Err(err) = entry.object.resolve(row.id) {
            tracing::warn!(record_id = %row.id, error = %err, "object already resolved");
            result.record_failure(row.id, key, err.to_string());
        }
        Ok(())
    }
}
