//! # InvRefresh Core
//!
//! Reconciles inventory fetched from a managed system against the rows a
//! record store already holds.
//!
//! ## Pieces
//!
//! - [`Registry`] and [`Descriptor`] - per-entity-type configuration, with
//!   the infrastructure catalog in [`infra_registry`]
//! - [`InventoryObject`] - a fetched entity, built via
//!   [`Descriptor::build_object`]
//! - [`IndexBuilder`] and [`IdentityIndex`] - fetched objects keyed by
//!   composite natural key
//! - [`ReconnectEngine`] - reclaims orphaned rows instead of duplicating them
//! - [`ScopeResolver`] - restricts targeted passes to rows of known parents
//! - [`Linker`] - writes same-collection references after save
//! - [`Reconciler`] - the entry points tying these together
//!
//! ## Flow
//!
//! 1. Build objects and index them with [`Reconciler::build_index`]
//! 2. Reclaim orphaned rows with [`Reconciler::reconcile`]; matched objects
//!    receive their row id
//! 3. Hand what is left in the index to the create path
//! 4. Link self references with [`Reconciler::link_cross_references`]

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod descriptor;
mod error;
mod index;
mod link;
mod object;
mod reconciler;
mod reconnect;
mod result;
mod scope;
mod types;

pub use config::ReconcileConfig;
pub use descriptor::{
    infra_registry, DefaultAttribute, Descriptor, DescriptorOverrides, Discriminator, Hooks,
    KeyAttribute, ManagerUuidExtractor, PersistenceStrategy, Registry, RegistryConfig,
    SaveStrategy, ScopeDefinition, ScopeHook, SelfReference, DEFAULT_BATCH_SIZE,
    DEFAULT_OWNER_COLUMN,
};
pub use error::{CoreError, CoreResult, KeyResolutionError};
pub use index::{CompositeKey, ExcludedObject, IdentityIndex, IndexBuild, IndexBuilder, IndexEntry};
pub use link::{LinkFailure, LinkReport, LinkWarning, Linker};
pub use object::{AttributeValue, BuildContext, InventoryObject};
pub use reconciler::Reconciler;
pub use reconnect::{assignable_attributes, changed_attributes, ReconnectEngine};
pub use result::{ReconciliationResult, RowFailure};
pub use scope::{KnownKeys, Scope, ScopeFallback, ScopeResolution, ScopeResolver};
pub use types::PassId;
