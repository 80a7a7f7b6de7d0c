//! Shared test utilities for the sci-wms workspace.
//!
//! - Synthetic UGRID, SGRID and regular grid datasets
//! - A temporary project directory for snapshots and caches
//! - Axis and field generators
//!
//! ```ignore
//! use test_utils::{ugrid_dataset, TestProject};
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
