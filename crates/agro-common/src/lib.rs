//! Common types and utilities shared across the agromodel crates and services.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod style;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{AgroError, AgroResult};
pub use grid::{chunk_windows, GeoTransform, Window};
pub use style::{ClassEntry, Color, LandCoverStyle, NO_DATA_CLASS};
pub use time::{months_between, MonthPeriod};
