//! Error types for NetCDF access.

use thiserror::Error;
use wms_common::WmsError;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF access.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The resource could not be opened
    #[error("Failed to open {path}: {message}")]
    OpenFailed { path: String, message: String },

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Snapshot (de)serialization error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Invalid glob pattern for multi-file datasets
    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Dataset claims SGRID conventions but does not follow them
    #[error(transparent)]
    Sgrid(#[from] crate::sgrid::SgridError),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF library error: {0}")]
    Native(#[from] netcdf::Error),
}

impl From<NetCdfError> for WmsError {
    fn from(err: NetCdfError) -> Self {
        match err {
            NetCdfError::MissingData(msg) => WmsError::DataReadError(msg),
            other => WmsError::NetCdfError(other.to_string()),
        }
    }
}
