//! Error types for grid processing.

use geotiff_io::GeoTiffError;
use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Failed to read a raster.
    #[error("failed to read raster: {0}")]
    ReadFailed(String),

    /// Failed to write a raster or report.
    #[error("failed to write output: {0}")]
    WriteFailed(String),

    /// Rasters that must share a grid have different sizes.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Rasters that must share a CRS do not.
    #[error("CRS mismatch: expected {expected}, found {found}")]
    CrsMismatch { expected: String, found: String },

    /// A raster has no CRS this workspace can project.
    #[error("raster has no usable CRS: {0}")]
    MissingCrs(String),

    /// Projection error.
    #[error("projection error: {0}")]
    ProjectionError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid input arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation that needs at least one input raster got none.
    #[error("no input rasters: {0}")]
    NoInputs(String),
}

impl GridProcessorError {
    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create a WriteFailed error.
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Create a CrsMismatch error.
    pub fn crs_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::CrsMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<GeoTiffError> for GridProcessorError {
    fn from(err: GeoTiffError) -> Self {
        match err {
            GeoTiffError::Encode(msg) => Self::WriteFailed(msg),
            other => Self::ReadFailed(other.to_string()),
        }
    }
}

impl From<projection::ProjectionError> for GridProcessorError {
    fn from(err: projection::ProjectionError) -> Self {
        Self::ProjectionError(err.to_string())
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::WriteFailed(err.to_string())
    }
}

impl From<serde_json::Error> for GridProcessorError {
    fn from(err: serde_json::Error) -> Self {
        Self::WriteFailed(err.to_string())
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
