//! # InvRefresh Storage
//!
//! Persisted-store capability consumed by the InvRefresh reconciliation core.
//!
//! The core never talks to a database directly. It needs three things from
//! the store, and this crate describes exactly those:
//!
//! - Queries with equality, `IN`, `IS NULL` and join-based scoping
//! - Single-row write transactions (assign attributes, then save)
//! - Lookups of rows by id
//!
//! ## Design Principles
//!
//! - Stores are row stores keyed by [`RecordId`]; schemas are not modelled
//! - Owner links and type columns are ordinary attributes
//! - A failing transaction leaves no partial writes behind
//! - Stores must be `Send + Sync`
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For tests, benchmarks and embedding
//!
//! ## Example
//!
//! ```rust
//! use invrefresh_storage::{Filter, InMemoryStore, RecordQuery, RecordStore};
//! use invrefresh_value::attributes;
//!
//! let store = InMemoryStore::new();
//! store.insert("vms", attributes([("ems_ref", "vm-42")])).unwrap();
//!
//! let orphans = RecordQuery::table("vms").filter(Filter::is_null("ems_id"));
//! assert_eq!(store.count(&orphans).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod query;
mod record;

pub use backend::{RecordStore, StoreTransaction};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use query::{Filter, JoinHop, JoinScope, RecordQuery};
pub use record::{Record, RecordId};
