//! Storage for sci-wms.
//!
//! The catalog keeps registered datasets together with the layers and
//! virtual layers discovered in them, in a single SQLite database.

pub mod catalog;

pub use catalog::{Catalog, DatasetRecord, NewDataset};
