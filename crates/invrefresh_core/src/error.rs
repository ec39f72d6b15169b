//! Error types for the reconciliation core.

use crate::result::ReconciliationResult;
use invrefresh_storage::RecordId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in reconciliation core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] invrefresh_storage::StorageError),

    /// No descriptor is registered for the entity type.
    #[error("unknown entity type: {entity_type}")]
    UnknownEntityType {
        /// The entity type requested.
        entity_type: String,
    },

    /// A descriptor failed validation.
    #[error("invalid descriptor for {entity_type}: {message}")]
    InvalidDescriptor {
        /// Entity type of the descriptor.
        entity_type: String,
        /// What is wrong with it.
        message: String,
    },

    /// An attribute is not part of the collection's inventory attributes.
    #[error("attribute {attribute} is not allowed on {entity_type}")]
    UnknownAttribute {
        /// Entity type of the object being built.
        entity_type: String,
        /// The rejected attribute name.
        attribute: String,
    },

    /// Registry or reconcile configuration could not be loaded.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// An inventory object already carries a different persisted identity.
    #[error("object already resolved to {existing}, refusing {attempted}")]
    AlreadyResolved {
        /// Identity set first.
        existing: RecordId,
        /// Identity that was rejected.
        attempted: RecordId,
    },

    /// Strict mode: the pass completed but some rows failed to write.
    #[error("{} row(s) of {entity_type} failed to reconcile", .result.failures.len())]
    RowFailures {
        /// Entity type of the pass.
        entity_type: String,
        /// The full outcome of the pass, failures included.
        result: Box<ReconciliationResult>,
    },
}

impl CoreError {
    /// Creates an unknown entity type error.
    pub fn unknown_entity_type(entity_type: impl Into<String>) -> Self {
        Self::UnknownEntityType {
            entity_type: entity_type.into(),
        }
    }

    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}

/// A natural key component of an object resolved to null.
///
/// Such objects cannot be indexed and go to the create path only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("natural key attribute {attribute} of {entity_type} resolved to null")]
pub struct KeyResolutionError {
    /// Entity type of the object.
    pub entity_type: String,
    /// First key attribute that resolved to null.
    pub attribute: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrefresh_storage::StorageError;

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = StorageError::Unavailable("down".into()).into();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: store unavailable: down");
    }

    #[test]
    fn json_errors_become_config_errors() {
        let err: CoreError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }

    #[test]
    fn row_failures_display_counts() {
        let mut result = ReconciliationResult::new("vms");
        result.record_failure(
            RecordId::new(1),
            crate::CompositeKey::new(vec!["vm-1".into()]),
            "locked",
        );
        let err = CoreError::RowFailures {
            entity_type: "vms".into(),
            result: Box::new(result),
        };
        assert_eq!(err.to_string(), "1 row(s) of vms failed to reconcile");
    }

    #[test]
    fn key_resolution_display() {
        let err = KeyResolutionError {
            entity_type: "vms".into(),
            attribute: "ems_ref".into(),
        };
        assert_eq!(
            err.to_string(),
            "natural key attribute ems_ref of vms resolved to null"
        );
    }
}
