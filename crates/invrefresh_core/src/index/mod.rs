//! Identity key index.
//!
//! Fetched objects are indexed by their composite natural key so orphaned
//! rows can be matched against them. The index owns two maps, objects and
//! pending attributes, and only ever removes from both together.

mod builder;
mod identity;
mod key;

pub use builder::{ExcludedObject, IndexBuild, IndexBuilder};
pub use identity::{IdentityIndex, IndexEntry};
pub use key::CompositeKey;
