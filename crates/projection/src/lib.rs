//! Coordinate reference system transformations.
//!
//! Implements the map projections used by Sentinel-2 tiles and the Argentine
//! crop maps from scratch without external dependencies.

pub mod mercator;
pub mod transform;
pub mod transverse_mercator;

pub use mercator::WebMercator;
pub use transform::{transform_bounds, transform_point, Projection, ProjectionError};
pub use transverse_mercator::TransverseMercator;

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6378137.0;

/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257223563;
