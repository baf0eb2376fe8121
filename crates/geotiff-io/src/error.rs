//! Error types for GeoTIFF reading and writing.

use thiserror::Error;

/// Result type for GeoTIFF operations.
pub type GeoTiffResult<T> = Result<T, GeoTiffError>;

/// Error types for GeoTIFF I/O.
#[derive(Error, Debug)]
pub enum GeoTiffError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The TIFF structure could not be decoded
    #[error("TIFF decode error: {0}")]
    Decode(String),

    /// The TIFF could not be written
    #[error("TIFF encode error: {0}")]
    Encode(String),

    /// Pixel layout or sample type this crate does not read
    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// Band index outside 1..=count
    #[error("Band {band} out of range (raster has {count} bands)")]
    BandOutOfRange { band: usize, count: usize },

    /// Missing georeferencing tags
    #[error("Missing georeference: {0}")]
    MissingGeoreference(String),

    /// Bands of a multi-band write disagree in size
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
}

impl From<tiff::TiffError> for GeoTiffError {
    fn from(err: tiff::TiffError) -> Self {
        match err {
            tiff::TiffError::IoError(e) => GeoTiffError::IoError(e),
            tiff::TiffError::UnsupportedError(e) => {
                GeoTiffError::UnsupportedDataType(e.to_string())
            }
            other => GeoTiffError::Decode(other.to_string()),
        }
    }
}

impl From<GeoTiffError> for agro_common::AgroError {
    fn from(err: GeoTiffError) -> Self {
        match err {
            GeoTiffError::Encode(_) => agro_common::AgroError::DataWriteError(err.to_string()),
            other => agro_common::AgroError::DataReadError(other.to_string()),
        }
    }
}
