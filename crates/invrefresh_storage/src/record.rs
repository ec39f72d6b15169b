//! Persisted rows and their identifiers.

use invrefresh_value::{attribute, AttributeMap, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted identity of a row.
///
/// Record IDs are:
/// - Assigned by the store on insert
/// - Immutable once assigned
/// - Stored in reference columns as [`Value::Integer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Creates a record ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reads a record ID back out of a reference column value.
    ///
    /// Returns `None` for nulls, negative integers and non-integers.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec:{}", self.0)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        // Ids beyond i64::MAX are never handed out by a store.
        Value::Integer(i64::try_from(id.0).unwrap_or(i64::MAX))
    }
}

/// A persisted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Row identity.
    pub id: RecordId,
    /// Table the row lives in.
    pub table: String,
    /// Column values, including owner links and the type column.
    pub attributes: AttributeMap,
}

impl Record {
    /// Creates a record.
    pub fn new(id: RecordId, table: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            id,
            table: table.into(),
            attributes,
        }
    }

    /// Reads a column, treating missing columns as null.
    pub fn get(&self, column: &str) -> &Value {
        attribute(&self.attributes, column)
    }
}
