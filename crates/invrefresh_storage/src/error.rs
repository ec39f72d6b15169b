//! Error types for storage operations.

use crate::record::RecordId;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A row addressed by id does not exist.
    #[error("record {id} not found in {table}")]
    RecordNotFound {
        /// Table searched.
        table: String,
        /// Missing row id.
        id: RecordId,
    },

    /// The store refused a row write.
    #[error("write to {table} {id} rejected: {reason}")]
    WriteRejected {
        /// Table written to.
        table: String,
        /// Row id.
        id: RecordId,
        /// Reason given by the store.
        reason: String,
    },

    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The query cannot be executed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl StorageError {
    /// Creates a write rejected error.
    pub fn write_rejected(table: impl Into<String>, id: RecordId, reason: impl Into<String>) -> Self {
        Self::WriteRejected {
            table: table.into(),
            id,
            reason: reason.into(),
        }
    }

    /// Creates a record not found error.
    pub fn record_not_found(table: impl Into<String>, id: RecordId) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            id,
        }
    }

    /// Returns true if the error concerns a single row rather than the store.
    ///
    /// Row-level errors are isolated by the reconciliation core; everything
    /// else aborts the pass.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            StorageError::RecordNotFound { .. } | StorageError::WriteRejected { .. }
        )
    }
}
