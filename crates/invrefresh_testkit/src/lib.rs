//! # InvRefresh Testkit
//!
//! Test utilities for InvRefresh.
//!
//! This crate provides:
//! - Inventory fixtures over an in-memory store
//! - Property-based test generators using proptest
//! - A refresh harness that plays the create path after reconciliation
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use invrefresh_testkit::prelude::*;
//!
//! with_test_inventory(|inventory| {
//!     let orphan = inventory.orphan_vm("vm-1");
//!     let outcome = RefreshHarness::new(inventory).refresh("vms", vec![inventory.vm("vm-1")]);
//!     assert!(outcome.result.updated.contains(&orphan));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use logging::*;
