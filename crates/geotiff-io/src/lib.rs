//! GeoTIFF reader and writer for Sentinel-2 NDVI products and crop maps.
//!
//! Built on the pure-Rust `tiff` crate, so no GDAL installation is needed.
//! Georeferencing is read from ModelPixelScale/ModelTiepoint (or
//! ModelTransformation), the CRS from the GeoKey directory, nodata from the
//! GDAL_NODATA tag and band names from GDAL_METADATA or ImageDescription.
//!
//! # Band layout
//!
//! Files written here store one band per image directory. Files from other
//! tools may instead keep several samples in a single directory, either
//! pixel-interleaved or band-interleaved (`INTERLEAVE=BAND`). All three
//! layouts are read.

pub mod band;
mod chunks;
pub mod error;
pub mod geokeys;
pub mod reader;
pub mod writer;

pub use band::{is_valid, RasterBand};
pub use error::{GeoTiffError, GeoTiffResult};
pub use reader::{read_all_bands, read_band, read_info, RasterInfo};
pub use writer::{write_band_names, GeoTiffWriter, PixelType};
