//! Store capability traits.

use crate::error::StorageResult;
use crate::query::RecordQuery;
use crate::record::{Record, RecordId};
use invrefresh_value::AttributeMap;

/// Persisted-store capability used by the reconciliation core.
///
/// # Invariants
///
/// - `find` returns rows in ascending id order
/// - `insert` returns a fresh id that is never reused
/// - Writes made inside `transaction` become visible together when the
///   closure returns `Ok`, and not at all when it returns `Err`
/// - Stores must be `Send + Sync`; a store may be shared by concurrent
///   passes for different managed systems
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and embedding
pub trait RecordStore: Send + Sync {
    /// Returns all rows matching the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be executed or the store is
    /// unreachable.
    fn find(&self, query: &RecordQuery) -> StorageResult<Vec<Record>>;

    /// Returns the number of rows matching the query.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::find`].
    fn count(&self, query: &RecordQuery) -> StorageResult<usize> {
        Ok(self.find(query)?.len())
    }

    /// Reads a row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn get(&self, table: &str, id: RecordId) -> StorageResult<Option<Record>>;

    /// Inserts a row and returns its id.
    ///
    /// This is the entry point of the external create path.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected.
    fn insert(&self, table: &str, attributes: AttributeMap) -> StorageResult<RecordId>;

    /// Runs `work` inside a transaction.
    ///
    /// If `work` returns `Ok`, all writes are committed atomically.
    /// If it returns `Err`, they are discarded and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or a store error if the
    /// transaction cannot be started or committed.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StorageResult<()>,
    ) -> StorageResult<()>;
}

/// Operations available inside a [`RecordStore::transaction`].
///
/// Reads observe the transaction's own uncommitted writes.
pub trait StoreTransaction {
    /// Returns all rows matching the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be executed.
    fn find(&mut self, query: &RecordQuery) -> StorageResult<Vec<Record>>;

    /// Reads a row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn get(&mut self, table: &str, id: RecordId) -> StorageResult<Option<Record>>;

    /// Assigns `changes` onto an existing row.
    ///
    /// Columns not mentioned in `changes` keep their values.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RecordNotFound`](crate::StorageError::RecordNotFound)
    /// if the row does not exist, or
    /// [`StorageError::WriteRejected`](crate::StorageError::WriteRejected) if the
    /// store refuses the write.
    fn update(&mut self, table: &str, id: RecordId, changes: &AttributeMap) -> StorageResult<()>;
}
