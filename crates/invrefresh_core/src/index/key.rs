//! Composite natural keys.

use crate::descriptor::Descriptor;
use crate::error::KeyResolutionError;
use crate::object::InventoryObject;
use invrefresh_storage::Record;
use invrefresh_value::Value;
use std::fmt;

/// Ordered natural key values of one object or row.
///
/// Keys built by [`CompositeKey::for_object`] and
/// [`CompositeKey::for_record`] never contain a null component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey(Vec<Value>);

impl CompositeKey {
    /// Wraps key values as given.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Key of a fetched object.
    ///
    /// Scalar components are read from the object's attributes. Reference
    /// components use the referenced object's row id when it is persisted,
    /// and its own natural key otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolutionError`] naming the first component that is
    /// null or missing.
    pub fn for_object(
        descriptor: &Descriptor,
        object: &InventoryObject,
    ) -> Result<Self, KeyResolutionError> {
        descriptor
            .natural_key
            .iter()
            .map(|attr| {
                let value = object
                    .attribute(attr.name())
                    .map(|a| a.key_value())
                    .unwrap_or_default();
                if value.contains_null() {
                    Err(KeyResolutionError {
                        entity_type: descriptor.entity_type.clone(),
                        attribute: attr.name().to_string(),
                    })
                } else {
                    Ok(value)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Key of a persisted row, read from its own columns.
    ///
    /// Returns `None` if any key column is null.
    pub fn for_record(descriptor: &Descriptor, record: &Record) -> Option<Self> {
        descriptor
            .natural_key
            .iter()
            .map(|attr| {
                let value = record.get(attr.column());
                (!value.contains_null()).then(|| value.clone())
            })
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// First component, the one reconnect batches are queried by.
    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    /// All components in order.
    pub fn components(&self) -> &[Value] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}
