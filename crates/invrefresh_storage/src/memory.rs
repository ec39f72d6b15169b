//! In-memory record store.

use crate::backend::{RecordStore, StoreTransaction};
use crate::error::{StorageError, StorageResult};
use crate::query::{JoinScope, RecordQuery};
use crate::record::{Record, RecordId};
use invrefresh_value::{attribute, AttributeMap};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

type Table = BTreeMap<RecordId, AttributeMap>;
type Tables = HashMap<String, Table>;
type Pending = HashMap<(String, RecordId), AttributeMap>;

/// An in-memory record store.
///
/// This store keeps all rows in memory and is suitable for:
/// - Unit and integration tests
/// - Benchmarks
/// - Embedding the reconciliation core without a database
///
/// # Thread Safety
///
/// Readers share an `RwLock`; write transactions are serialised by a
/// separate mutex so only one transaction is open at a time.
///
/// # Test Hooks
///
/// [`InMemoryStore::reject_writes`] and [`InMemoryStore::set_unavailable`]
/// simulate row-level and store-level failures, and
/// [`InMemoryStore::write_count`] counts committed row writes.
///
/// # Example
///
/// ```rust
/// use invrefresh_storage::{InMemoryStore, RecordStore};
/// use invrefresh_value::attributes;
///
/// let store = InMemoryStore::new();
/// let id = store.insert("vms", attributes([("name", "web-1")])).unwrap();
/// assert_eq!(store.get("vms", id).unwrap().unwrap().get("name").as_text(), Some("web-1"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
    write_lock: Mutex<()>,
    writes: AtomicU64,
    rejected: RwLock<HashSet<(String, RecordId)>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows committed so far (inserts plus updated rows).
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// Makes every future update of this row fail with `WriteRejected`.
    pub fn reject_writes(&self, table: &str, id: RecordId) {
        self.rejected.write().insert((table.to_string(), id));
    }

    /// Undoes [`InMemoryStore::reject_writes`].
    pub fn allow_writes(&self, table: &str, id: RecordId) {
        self.rejected.write().remove(&(table.to_string(), id));
    }

    /// Makes every operation fail with `Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("in-memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn is_rejected(&self, table: &str, id: RecordId) -> bool {
        self.rejected.read().contains(&(table.to_string(), id))
    }
}

impl RecordStore for InMemoryStore {
    fn find(&self, query: &RecordQuery) -> StorageResult<Vec<Record>> {
        self.check_available()?;
        let tables = self.tables.read();
        View::committed(&tables).find(query)
    }

    fn get(&self, table: &str, id: RecordId) -> StorageResult<Option<Record>> {
        self.check_available()?;
        let tables = self.tables.read();
        Ok(View::committed(&tables)
            .row(table, id)
            .map(|attrs| Record::new(id, table, attrs.clone())))
    }

    fn insert(&self, table: &str, attributes: AttributeMap) -> StorageResult<RecordId> {
        self.check_available()?;
        if table.is_empty() {
            return Err(StorageError::InvalidQuery("empty table name".into()));
        }
        let id = RecordId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(id, attributes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn StoreTransaction) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let _writer = self.write_lock.lock();
        self.check_available()?;

        let pending = {
            let tables = self.tables.read();
            let mut txn = MemoryTransaction {
                store: self,
                tables: &tables,
                pending: Pending::new(),
            };
            // Dropping `txn` on error discards its pending writes.
            work(&mut txn)?;
            txn.pending
        };

        let written = pending.len() as u64;
        let mut tables = self.tables.write();
        for ((table, id), attrs) in pending {
            if let Some(rows) = tables.get_mut(&table) {
                rows.insert(id, attrs);
            }
        }
        self.writes.fetch_add(written, Ordering::SeqCst);
        Ok(())
    }
}

/// Open transaction over an [`InMemoryStore`].
struct MemoryTransaction<'t> {
    store: &'t InMemoryStore,
    tables: &'t Tables,
    pending: Pending,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn find(&mut self, query: &RecordQuery) -> StorageResult<Vec<Record>> {
        View::with_pending(self.tables, &self.pending).find(query)
    }

    fn get(&mut self, table: &str, id: RecordId) -> StorageResult<Option<Record>> {
        Ok(View::with_pending(self.tables, &self.pending)
            .row(table, id)
            .map(|attrs| Record::new(id, table, attrs.clone())))
    }

    fn update(&mut self, table: &str, id: RecordId, changes: &AttributeMap) -> StorageResult<()> {
        if self.store.is_rejected(table, id) {
            return Err(StorageError::write_rejected(
                table,
                id,
                "write rejected by store",
            ));
        }

        let key = (table.to_string(), id);
        let mut row = match self.pending.get(&key) {
            Some(row) => row.clone(),
            None => self
                .tables
                .get(table)
                .and_then(|rows| rows.get(&id))
                .cloned()
                .ok_or_else(|| StorageError::record_not_found(table, id))?,
        };
        for (column, value) in changes {
            row.insert(column.clone(), value.clone());
        }
        self.pending.insert(key, row);
        Ok(())
    }
}

/// Committed rows, optionally overlaid with a transaction's pending writes.
struct View<'a> {
    tables: &'a Tables,
    pending: Option<&'a Pending>,
}

impl<'a> View<'a> {
    fn committed(tables: &'a Tables) -> Self {
        Self {
            tables,
            pending: None,
        }
    }

    fn with_pending(tables: &'a Tables, pending: &'a Pending) -> Self {
        Self {
            tables,
            pending: Some(pending),
        }
    }

    fn row(&self, table: &str, id: RecordId) -> Option<&'a AttributeMap> {
        if let Some(row) = self
            .pending
            .and_then(|pending| pending.get(&(table.to_string(), id)))
        {
            return Some(row);
        }
        self.tables.get(table)?.get(&id)
    }

    fn joined(&self, start: &AttributeMap, scope: &JoinScope) -> bool {
        let mut current = start;
        for hop in &scope.hops {
            let Some(id) = RecordId::from_value(attribute(current, &hop.column)) else {
                return false;
            };
            let Some(next) = self.row(&hop.table, id) else {
                return false;
            };
            current = next;
        }
        scope.filter.matches(current)
    }

    fn find(&self, query: &RecordQuery) -> StorageResult<Vec<Record>> {
        if query.table.is_empty() {
            return Err(StorageError::InvalidQuery("empty table name".into()));
        }
        let Some(rows) = self.tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        Ok(rows
            .keys()
            .filter_map(|id| {
                let attrs = self.row(&query.table, *id)?;
                if !query.matches_columns(attrs) {
                    return None;
                }
                if let Some(scope) = &query.join {
                    if !self.joined(attrs, scope) {
                        return None;
                    }
                }
                Some(Record::new(*id, query.table.as_str(), attrs.clone()))
            })
            .collect())
    }
}
