//! Error types for sci-wms services.

use thiserror::Error;

/// Result type alias using WmsError.
pub type WmsResult<T> = Result<T, WmsError>;

/// Primary error type for WMS model operations.
#[derive(Debug, Error)]
pub enum WmsError {
    // === WMS Protocol Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Operation not implemented for this dataset type: {0}")]
    NotImplemented(&'static str),

    // === Dataset Errors ===
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Invalid dataset name '{name}': {reason}")]
    InvalidDatasetName { name: String, reason: String },

    #[error("No time variable found for layer: {0}")]
    NoTimeVariable(String),

    #[error("Data not available for time: {0}")]
    DataNotAvailable(String),

    #[error("Failed to read data: {0}")]
    DataReadError(String),

    #[error("Invalid NetCDF data: {0}")]
    NetCdfError(String),

    // === Storage Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl WmsError {
    /// Get the OGC WMS exception code for this error.
    pub fn wms_exception_code(&self) -> &'static str {
        match self {
            WmsError::MissingParameter(_) => "MissingParameterValue",
            WmsError::InvalidParameter { .. } => "InvalidParameterValue",
            WmsError::LayerNotFound(_) | WmsError::DatasetNotFound(_) => "LayerNotDefined",
            WmsError::InvalidTime(_) => "InvalidDimensionValue",
            WmsError::UnsupportedFormat(_) => "InvalidFormat",
            WmsError::DataNotAvailable(_) | WmsError::NoTimeVariable(_) => {
                "MissingDimensionValue"
            }
            WmsError::NotImplemented(_) => "OperationNotSupported",
            _ => "NoApplicableCode",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            WmsError::MissingParameter(_)
            | WmsError::InvalidParameter { .. }
            | WmsError::InvalidTime(_)
            | WmsError::UnsupportedFormat(_)
            | WmsError::InvalidDatasetName { .. } => 400,

            WmsError::LayerNotFound(_)
            | WmsError::DatasetNotFound(_)
            | WmsError::NoTimeVariable(_)
            | WmsError::DataNotAvailable(_) => 404,

            WmsError::NotImplemented(_) => 501,

            _ => 500,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for WmsError {
    fn from(err: std::io::Error) -> Self {
        WmsError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for WmsError {
    fn from(err: serde_json::Error) -> Self {
        WmsError::InternalError(format!("JSON error: {}", err))
    }
}

impl From<crate::time::TimeParseError> for WmsError {
    fn from(err: crate::time::TimeParseError) -> Self {
        WmsError::InvalidTime(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_maps_to_501() {
        let err = WmsError::NotImplemented("getmap");
        assert_eq!(err.http_status_code(), 501);
        assert_eq!(err.wms_exception_code(), "OperationNotSupported");
        assert!(err.to_string().contains("getmap"));
    }

    #[test]
    fn test_missing_time_is_dimension_error() {
        let err = WmsError::NoTimeVariable("temp".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.wms_exception_code(), "MissingDimensionValue");
    }
}
