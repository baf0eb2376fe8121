//! Image rendering for crop-class and NDVI rasters.
//!
//! - Classified previews coloured with a land-cover style
//! - Continuous NDVI colour ramps
//! - Monthly NDVI time-series charts per crop class
//! - PNG encoding (indexed when the image fits a palette)

pub mod chart;
pub mod classified;
pub mod error;
pub mod png;
pub mod ramp;

pub use chart::{render_time_series, ChartOptions, Panel, PlotArea, Series};
pub use classified::{class_counts, render_classes};
pub use error::{RenderError, RenderResult};
pub use png::{encode_auto, encode_indexed, encode_rgba, save_png, Palette};
pub use ramp::{render_ramp, ColorRamp};
