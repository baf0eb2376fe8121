//! Projection utilities for grid processing.
//!
//! This module handles coordinate transformations and interpolation
//! for warping rasters onto a common reference grid.

pub mod interpolation;
pub mod reproject;

pub use interpolation::{
    bilinear_interpolate, cubic_interpolate, interpolate, nearest_interpolate, resample_grid,
};
pub use reproject::{warp_to_grid, warp_window};
