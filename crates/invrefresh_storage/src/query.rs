//! Query model for persisted rows.
//!
//! Queries are plain data. A store executes them however it likes; the
//! [`InMemoryStore`](crate::InMemoryStore) evaluates them row by row.
//!
//! ```rust
//! use invrefresh_storage::{Filter, JoinHop, JoinScope, RecordQuery};
//!
//! // Hardware rows of VMs with known ems_refs.
//! let query = RecordQuery::table("hardwares").join(JoinScope::new(
//!     vec![JoinHop::new("vm_or_template_id", "vms")],
//!     Filter::any_of("ems_ref", vec!["vm-1".into(), "vm-2".into()]),
//! ));
//! assert_eq!(query.table, "hardwares");
//! ```

use invrefresh_value::{attribute, AttributeMap, Value};
use serde::{Deserialize, Serialize};

/// A predicate on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Column is null or absent.
    IsNull(String),
    /// Column equals a non-null value.
    Eq(String, Value),
    /// Column equals one of the values. An empty list matches nothing.
    In(String, Vec<Value>),
}

impl Filter {
    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    /// `column IN (values)`
    pub fn any_of(column: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In(column.into(), values)
    }

    /// Column this filter reads.
    pub fn column(&self) -> &str {
        match self {
            Filter::IsNull(c) | Filter::Eq(c, _) | Filter::In(c, _) => c,
        }
    }

    /// Evaluates the filter against a row's attributes.
    ///
    /// Null never equals anything, as in SQL.
    pub fn matches(&self, attributes: &AttributeMap) -> bool {
        match self {
            Filter::IsNull(column) => attribute(attributes, column).is_null(),
            Filter::Eq(column, value) => {
                let current = attribute(attributes, column);
                !current.is_null() && current == value
            }
            Filter::In(column, values) => {
                let current = attribute(attributes, column);
                !current.is_null() && values.contains(current)
            }
        }
    }
}

/// One step of a join: follow a reference column into another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinHop {
    /// Reference column on the current row holding the target row's id.
    pub column: String,
    /// Table the reference points into.
    pub table: String,
}

impl JoinHop {
    /// Creates a join hop.
    pub fn new(column: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: table.into(),
        }
    }
}

/// Restricts rows to those whose joined row satisfies a filter.
///
/// Rows whose reference chain is broken (null or dangling) never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinScope {
    /// Reference chain from the queried table to the filtered table.
    pub hops: Vec<JoinHop>,
    /// Filter applied to the last row of the chain.
    pub filter: Filter,
}

impl JoinScope {
    /// Creates a join scope.
    pub fn new(hops: Vec<JoinHop>, filter: Filter) -> Self {
        Self { hops, filter }
    }

    /// Table the filter is evaluated against.
    pub fn target_table(&self) -> Option<&str> {
        self.hops.last().map(|hop| hop.table.as_str())
    }
}

/// A query over one table.
///
/// All filters are combined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Table queried.
    pub table: String,
    /// Column filters on the queried table.
    pub filters: Vec<Filter>,
    /// Optional join-based scope.
    pub join: Option<JoinScope>,
}

impl RecordQuery {
    /// Starts a query over `table` with no filters.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            join: None,
        }
    }

    /// Adds a filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the join scope, replacing any previous one.
    #[must_use]
    pub fn join(mut self, scope: JoinScope) -> Self {
        self.join = Some(scope);
        self
    }

    /// Evaluates the column filters against a row (the join is not checked).
    pub fn matches_columns(&self, attributes: &AttributeMap) -> bool {
        self.filters.iter().all(|f| f.matches(attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrefresh_value::attributes;

    #[test]
    fn is_null_matches_missing_and_null() {
        let filter = Filter::is_null("ems_id");
        assert!(filter.matches(&attributes([("name", "a")])));
        assert!(filter.matches(&attributes([("ems_id", Value::Null)])));
        assert!(!filter.matches(&attributes([("ems_id", 7i64)])));
    }

    #[test]
    fn eq_never_matches_null() {
        assert!(!Filter::eq("ems_id", Value::Null).matches(&attributes([("ems_id", Value::Null)])));
        assert!(Filter::eq("ems_id", 7i64).matches(&attributes([("ems_id", 7i64)])));
    }

    #[test]
    fn in_list() {
        let filter = Filter::any_of("ems_ref", vec!["a".into(), "b".into()]);
        assert!(filter.matches(&attributes([("ems_ref", "b")])));
        assert!(!filter.matches(&attributes([("ems_ref", "c")])));
        assert!(!Filter::any_of("ems_ref", vec![]).matches(&attributes([("ems_ref", "a")])));
    }

    #[test]
    fn in_list_is_type_exact() {
        let filter = Filter::any_of("ems_ref", vec![Value::Integer(7)]);
        assert!(!filter.matches(&attributes([("ems_ref", "7")])));
    }

    #[test]
    fn query_combines_filters() {
        let query = RecordQuery::table("vms")
            .filter(Filter::is_null("ems_id"))
            .filter(Filter::eq("name", "web-1"));
        assert!(query.matches_columns(&attributes([("name", "web-1")])));
        assert!(!query.matches_columns(&attributes([("name", "web-2")])));
        assert!(!query.matches_columns(&attributes([("name", Value::from("web-1")), ("ems_id", 1i64.into())])));
    }

    #[test]
    fn join_target_table() {
        let scope = JoinScope::new(
            vec![
                JoinHop::new("hardware_id", "hardwares"),
                JoinHop::new("vm_or_template_id", "vms"),
            ],
            Filter::any_of("ems_ref", vec![]),
        );
        assert_eq!(scope.target_table(), Some("vms"));
    }
}
