//! The sci-wms dataset model.
//!
//! Ties the catalog, netCDF access and the topology cache together:
//! - [`Dataset`]: one registered dataset and its operations
//! - [`kinds`]: UGRID, SGRID and regular grid conventions
//! - [`nearest`]: nearest time step lookup
//! - [`layers`]: layer and virtual layer discovery
//! - [`refresh`]: keep-up-to-date rebuilds

pub mod config;
pub mod dataset;
pub mod kinds;
pub mod layers;
pub mod nearest;
pub mod refresh;
pub mod response;
pub mod topology;

pub use config::Settings;
pub use dataset::{default_store, resolve_path, Dataset, DatasetContext};
pub use kinds::{identify, kind_by_name, registered_kinds, DatasetKind, GenericKind};
pub use layers::{LayerSummary, VectorFamily, VECTOR_FAMILIES};
pub use nearest::{bisect_right, nearest_time_index};
pub use refresh::{is_stale, refresh_all, refresh_dataset, RefreshReport};
pub use response::{empty_response, WmsRequest, WmsResponse, DEFAULT_CONTENT_TYPE, MAX_IMAGE_DIMENSION};
pub use topology::{CacheOutcome, DomainSummary, TopologyPaths};
