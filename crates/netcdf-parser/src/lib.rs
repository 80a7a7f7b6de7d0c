//! NetCDF dataset access for sci-wms.
//!
//! Datasets are read through the [`NcDataset`] trait and opened through an
//! [`NcStore`]. Two stores are provided:
//!
//! - [`MemoryStore`] serves registered in-memory datasets and JSON snapshots.
//!   Always available; used by test fixtures and by builds without libnetcdf.
//! - `NativeStore` reads local files and OPeNDAP URLs through libnetcdf.
//!   Enabled by the default `netcdf` feature (needs libhdf5-dev libnetcdf-dev).
//!
//! A URI that does not open as a single dataset is treated as a glob and
//! aggregated along `time`, see [`open_dataset`].

pub mod aggregate;
pub mod dataset;
pub mod error;
pub mod memory;
pub mod sgrid;
pub mod store;

#[cfg(feature = "netcdf")]
pub mod native;

pub use aggregate::AggregatedDataset;
pub use dataset::{unpack, AttrValue, NcDataset, VariableInfo};
pub use error::{NetCdfError, NetCdfResult};
pub use memory::{Dimension, MemoryDataset, MemoryStore};
pub use sgrid::{parse_padding, GridPadding, Padding, SgridError, SgridTopology};
pub use store::{
    glob_files, open_dataset, try_open_dataset, write_atomic, NcStore, AGGREGATION_DIMENSION,
};

#[cfg(feature = "netcdf")]
pub use native::{silence_hdf5_errors, NativeDataset, NativeStore};
