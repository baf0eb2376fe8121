//! Error types for agromodel crates.

use thiserror::Error;

/// Result type alias using AgroError.
pub type AgroResult<T> = Result<T, AgroError>;

/// Primary error type shared by the processing crates.
#[derive(Debug, Error)]
pub enum AgroError {
    // === Input Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid BBOX: {0}")]
    InvalidBbox(String),

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    // === Style Errors ===
    #[error("Invalid style: {0}")]
    InvalidStyle(String),

    #[error("Duplicate class value in style: {0}")]
    DuplicateClass(i64),

    // === Data Errors ===
    #[error("Failed to read data: {0}")]
    DataReadError(String),

    #[error("Failed to write data: {0}")]
    DataWriteError(String),

    #[error("Raster dimensions do not match: {0}")]
    DimensionMismatch(String),

    #[error("Projection error: {0}")]
    ProjectionError(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AgroError {
    /// Shorthand for an `InvalidParameter` error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        AgroError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for AgroError {
    fn from(err: std::io::Error) -> Self {
        AgroError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for AgroError {
    fn from(err: serde_json::Error) -> Self {
        AgroError::InternalError(format!("JSON error: {}", err))
    }
}
