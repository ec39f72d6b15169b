//! Benchmarks for InvRefresh.
//!
//! The benchmarks live under `benches/`; this crate only carries the
//! shared input generators.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
