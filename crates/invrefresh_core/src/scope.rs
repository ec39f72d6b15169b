//! Targeted scope resolution.
//!
//! A targeted refresh only fetched some parents (say, a handful of VMs), so
//! the rows of dependent collections worth loading are those reachable from
//! the known parents. The resolver turns the parents' manager uuids into a
//! join-based restriction, and falls back to the whole table when it cannot.

use crate::descriptor::{Descriptor, PersistenceStrategy};
use crate::object::InventoryObject;
use invrefresh_storage::{JoinScope, RecordQuery};
use invrefresh_value::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Manager uuids of an already-resolved parent collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownKeys {
    /// Entity type of the parent collection.
    pub collection: String,
    /// Manager uuids fetched for it.
    pub keys: BTreeSet<Value>,
}

impl KnownKeys {
    /// Creates known keys from explicit values.
    pub fn new<I, V>(collection: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            collection: collection.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Derives the manager uuids of a parent collection's objects.
    ///
    /// Uses the descriptor's extractor hook when present, and the first
    /// natural key component otherwise. Null values are skipped.
    pub fn from_objects(descriptor: &Descriptor, objects: &[Arc<InventoryObject>]) -> Self {
        let extractor = descriptor.hooks.manager_uuid_extractor.as_ref();
        let keys = objects
            .iter()
            .filter_map(|object| match extractor {
                Some(extractor) => extractor.extract(object),
                None => object.natural_key().first().cloned(),
            })
            .filter(|value| !value.contains_null())
            .collect();
        Self {
            collection: descriptor.entity_type.clone(),
            keys,
        }
    }
}

/// Why a targeted pass fell back to an unscoped query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFallback {
    /// No parent collection contributed a key.
    NoKnownKeys,
    /// The collection has no way to build a targeted scope.
    NoScopeDefinition,
    /// The persistence strategy loads every row anyway.
    CacheAllStrategy,
}

impl fmt::Display for ScopeFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScopeFallback::NoKnownKeys => "no known parent keys",
            ScopeFallback::NoScopeDefinition => "no scope definition",
            ScopeFallback::CacheAllStrategy => "cache-all strategy",
        })
    }
}

/// Restriction applied to the rows a pass looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// All rows of the table.
    Unscoped,
    /// Rows reachable from known parents.
    Targeted(JoinScope),
}

impl Scope {
    /// Applies the scope to a query.
    #[must_use]
    pub fn apply(&self, query: RecordQuery) -> RecordQuery {
        match self {
            Scope::Unscoped => query,
            Scope::Targeted(join) => query.join(join.clone()),
        }
    }

    /// Whether the scope restricts anything.
    pub fn is_targeted(&self) -> bool {
        matches!(self, Scope::Targeted(_))
    }
}

/// Outcome of [`ScopeResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeResolution {
    /// Scope to apply.
    pub scope: Scope,
    /// Set when the resolver fell back to [`Scope::Unscoped`].
    pub fallback: Option<ScopeFallback>,
}

impl ScopeResolution {
    fn fallback(descriptor: &Descriptor, reason: ScopeFallback) -> Self {
        tracing::warn!(
            entity_type = %descriptor.entity_type,
            reason = %reason,
            "targeted refresh falling back to unscoped query"
        );
        Self {
            scope: Scope::Unscoped,
            fallback: Some(reason),
        }
    }
}

/// Builds targeted scopes from known parent keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeResolver;

impl ScopeResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves the scope of a targeted pass over `descriptor`'s rows.
    ///
    /// Keys of every known collection named in the descriptor's parent
    /// collections are unioned. The result restricts rows to those joined
    /// to a parent carrying one of those keys, which is a superset of the
    /// rows any fetched object can match.
    pub fn resolve(&self, descriptor: &Descriptor, known: &[KnownKeys]) -> ScopeResolution {
        if descriptor.strategy == Some(PersistenceStrategy::LocalDbCacheAll) {
            return ScopeResolution::fallback(descriptor, ScopeFallback::CacheAllStrategy);
        }

        let union: BTreeSet<&Value> = known
            .iter()
            .filter(|k| descriptor.parent_collections.contains(&k.collection))
            .flat_map(|k| &k.keys)
            .collect();
        if union.is_empty() {
            return ScopeResolution::fallback(descriptor, ScopeFallback::NoKnownKeys);
        }
        let keys: Vec<Value> = union.into_iter().cloned().collect();

        let join = match (&descriptor.hooks.scope, &descriptor.scope) {
            (Some(hook), _) => hook.build(descriptor, &keys),
            (None, Some(definition)) => Some(definition.join(keys)),
            (None, None) => None,
        };
        match join {
            Some(join) => {
                tracing::debug!(
                    entity_type = %descriptor.entity_type,
                    target = join.target_table().unwrap_or_default(),
                    "targeted scope resolved"
                );
                ScopeResolution {
                    scope: Scope::Targeted(join),
                    fallback: None,
                }
            }
            None => ScopeResolution::fallback(descriptor, ScopeFallback::NoScopeDefinition),
        }
    }
}
