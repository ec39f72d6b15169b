//! Fetched inventory objects.
//!
//! An [`InventoryObject`] is one entity as reported by the remote system.
//! Attributes are either plain values or references to other objects of the
//! same refresh. Once the object is matched or saved, its persisted identity
//! is recorded in a write-once cell so references to it resolve to a row id.

use crate::error::{CoreError, CoreResult};
use invrefresh_storage::RecordId;
use invrefresh_value::{AttributeMap, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// One attribute of an inventory object.
#[derive(Clone, PartialEq)]
pub enum AttributeValue {
    /// A plain value.
    Value(Value),
    /// A reference to another inventory object.
    Reference(Arc<InventoryObject>),
}

impl AttributeValue {
    /// Returns the plain value, if this is not a reference.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            AttributeValue::Value(v) => Some(v),
            AttributeValue::Reference(_) => None,
        }
    }

    /// Returns the referenced object, if this is a reference.
    pub fn as_reference(&self) -> Option<&Arc<InventoryObject>> {
        match self {
            AttributeValue::Value(_) => None,
            AttributeValue::Reference(obj) => Some(obj),
        }
    }

    /// Value this attribute contributes to a natural key.
    ///
    /// References contribute the referenced row id once it is known, and
    /// the referenced object's own natural key before that.
    pub fn key_value(&self) -> Value {
        match self {
            AttributeValue::Value(v) => v.clone(),
            AttributeValue::Reference(obj) => obj.key_value(),
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Value(v) => write!(f, "{v:?}"),
            AttributeValue::Reference(obj) => write!(
                f,
                "Reference({} {:?} -> {:?})",
                obj.collection,
                obj.natural_key,
                obj.resolved_id()
            ),
        }
    }
}

macro_rules! plain_attribute_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::Value(value.into())
                }
            }
        )*
    };
}

plain_attribute_from!(Value, bool, i64, i32, u32, String, &str, RecordId, Vec<Value>);

impl From<Arc<InventoryObject>> for AttributeValue {
    fn from(obj: Arc<InventoryObject>) -> Self {
        AttributeValue::Reference(obj)
    }
}

impl From<&Arc<InventoryObject>> for AttributeValue {
    fn from(obj: &Arc<InventoryObject>) -> Self {
        AttributeValue::Reference(Arc::clone(obj))
    }
}

/// An entity as fetched from the remote system.
///
/// Normally built through [`Descriptor::build_object`](crate::Descriptor::build_object),
/// which validates attribute names, applies defaults and records the
/// natural key.
#[derive(Debug)]
pub struct InventoryObject {
    collection: String,
    natural_key: Vec<Value>,
    attributes: BTreeMap<String, AttributeValue>,
    resolved_id: OnceLock<RecordId>,
}

impl InventoryObject {
    /// Creates an object of `collection`.
    ///
    /// `natural_key` is the object's key in unresolved form: references
    /// contribute their target's natural key rather than a row id.
    pub fn new(
        collection: impl Into<String>,
        natural_key: Vec<Value>,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> Self {
        Self {
            collection: collection.into(),
            natural_key,
            attributes,
            resolved_id: OnceLock::new(),
        }
    }

    /// Entity type of the collection this object belongs to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Natural key in unresolved form.
    pub fn natural_key(&self) -> &[Value] {
        &self.natural_key
    }

    /// All attributes.
    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Reads one attribute.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Reads a plain attribute value. Missing attributes and references
    /// return `None`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attribute(name).and_then(AttributeValue::as_value)
    }

    /// Plain attributes only, as a row-shaped map.
    pub fn plain_attributes(&self) -> AttributeMap {
        self.attributes
            .iter()
            .filter_map(|(name, attr)| Some((name.clone(), attr.as_value()?.clone())))
            .collect()
    }

    /// Persisted identity, once matched or saved.
    pub fn resolved_id(&self) -> Option<RecordId> {
        self.resolved_id.get().copied()
    }

    /// Records the persisted identity.
    ///
    /// Setting the same id again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyResolved`] if a different id was set before.
    pub fn resolve(&self, id: RecordId) -> CoreResult<()> {
        let existing = *self.resolved_id.get_or_init(|| id);
        if existing == id {
            Ok(())
        } else {
            Err(CoreError::AlreadyResolved {
                existing,
                attempted: id,
            })
        }
    }

    /// Value a reference to this object contributes to another key.
    pub fn key_value(&self) -> Value {
        match self.resolved_id() {
            Some(id) => id.into(),
            None => Value::Array(self.natural_key.clone()),
        }
    }
}

impl PartialEq for InventoryObject {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection
            && self.natural_key == other.natural_key
            && self.attributes == other.attributes
            && self.resolved_id() == other.resolved_id()
    }
}

/// Context of the refresh an object is built in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildContext {
    /// Row id of the managed system performing the refresh.
    pub manager_id: Option<RecordId>,
}

impl BuildContext {
    /// Context for a refresh of the given managed system.
    #[must_use]
    pub const fn for_manager(manager_id: RecordId) -> Self {
        Self {
            manager_id: Some(manager_id),
        }
    }
}
