//! Outcome of a reconcile pass.

use crate::index::CompositeKey;
use invrefresh_storage::RecordId;
use std::collections::BTreeSet;

/// A row whose write failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Row that was being written.
    pub record_id: RecordId,
    /// Natural key the row matched.
    pub key: CompositeKey,
    /// Store diagnostic.
    pub message: String,
}

/// Records affected by a reconcile pass.
///
/// `updated` and `reconnected` are filled by the reconnect engine; the
/// external create path reports into `created` with
/// [`ReconciliationResult::record_created`]. A record id appears in at
/// most one of the three sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Entity type reconciled. Empty after merging different types.
    pub entity_type: String,
    /// Rows inserted by the create path.
    pub created: BTreeSet<RecordId>,
    /// Orphaned rows reclaimed and written.
    pub updated: BTreeSet<RecordId>,
    /// Orphaned rows reclaimed without a write (nothing changed).
    pub reconnected: BTreeSet<RecordId>,
    /// Rows that matched but failed to write.
    pub failures: Vec<RowFailure>,
    /// Index entries left for the create path.
    pub unmatched: usize,
}

impl ReconciliationResult {
    /// Creates an empty result for an entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            ..Self::default()
        }
    }

    /// Records a row inserted by the create path.
    pub fn record_created(&mut self, id: RecordId) {
        self.created.insert(id);
    }

    /// Records a reclaimed row that was written.
    pub fn record_updated(&mut self, id: RecordId) {
        self.updated.insert(id);
    }

    /// Records a reclaimed row left as is.
    pub fn record_reconnected(&mut self, id: RecordId) {
        self.reconnected.insert(id);
    }

    /// Records a failed row write.
    pub fn record_failure(&mut self, record_id: RecordId, key: CompositeKey, message: impl Into<String>) {
        self.failures.push(RowFailure {
            record_id,
            key,
            message: message.into(),
        });
    }

    /// Whether any row failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Ids of failed rows.
    pub fn failed_ids(&self) -> BTreeSet<RecordId> {
        self.failures.iter().map(|f| f.record_id).collect()
    }

    /// Number of rows reclaimed, written or not.
    pub fn reclaimed(&self) -> usize {
        self.updated.len() + self.reconnected.len()
    }

    /// Whether the pass touched nothing.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.reconnected.is_empty()
            && self.failures.is_empty()
    }

    /// Folds another result into this one.
    ///
    /// Used to sum a refresh over several collections.
    pub fn merge(&mut self, other: ReconciliationResult) {
        if self.entity_type != other.entity_type {
            if self.is_empty() && self.unmatched == 0 {
                self.entity_type = other.entity_type;
            } else {
                self.entity_type.clear();
            }
        }
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.reconnected.extend(other.reconnected);
        self.failures.extend(other.failures);
        self.unmatched += other.unmatched;
    }
}
