//! Common types and utilities shared across the sci-wms crates.

pub mod bbox;
pub mod error;
pub mod layer;
pub mod names;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{WmsError, WmsResult};
pub use layer::{AnyLayer, Bounds, LayerRecord, Style, VirtualLayer};
pub use names::{safe_filename, slugify, validate_dataset_name};
pub use time::{Calendar, CfTimeUnits, TimeParseError};
