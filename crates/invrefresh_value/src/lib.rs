//! # InvRefresh Value
//!
//! Dynamic attribute values for InvRefresh.
//!
//! Every layer of the refresh pipeline moves attributes around as
//! [`AttributeMap`]s of [`Value`]s: fetched inventory objects, pending
//! attribute sets, persisted rows and query predicates.
//!
//! ## Rules
//!
//! - Values are `Eq + Hash + Ord` so they can be used as index keys
//! - Floats are not supported
//! - A missing attribute and an explicit [`Value::Null`] mean the same thing
//!
//! ## Usage
//!
//! ```
//! use invrefresh_value::{attributes, Value};
//!
//! let attrs = attributes([("name", Value::from("web-1")), ("ems_id", Value::from(7i64))]);
//! assert_eq!(attrs.get("name"), Some(&Value::Text("web-1".into())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod value;

pub use value::Value;

use std::collections::BTreeMap;

/// Attribute name to value mapping.
///
/// Ordered so that logs, diffs and serialized forms are deterministic.
pub type AttributeMap = BTreeMap<String, Value>;

/// Builds an [`AttributeMap`] from `(name, value)` pairs.
pub fn attributes<K, V, I>(pairs: I) -> AttributeMap
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Reads an attribute, treating a missing entry as [`Value::Null`].
pub fn attribute<'a>(map: &'a AttributeMap, name: &str) -> &'a Value {
    const NULL: &Value = &Value::Null;
    map.get(name).unwrap_or(NULL)
}
