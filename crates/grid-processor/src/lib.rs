//! Windowed raster processing for the NDVI-by-crop-class pipeline.
//!
//! Every operation works on a reference grid split into windows of
//! `chunk_size` pixels. Source rasters are warped onto each window, so the
//! crop maps (Gauss-Krüger or UTM) and the Sentinel-2 NDVI rasters (UTM 21S)
//! never need to be reprojected to disk first.
//!
//! # Pipeline
//!
//! ```text
//! NDVI_YYYY-MM.tif ──┬─► verify_consistency ─► 4_reporte_verificacion_ndvi.csv
//!                    ├─► season_series ──────► 2_ndvi_por_categoria.json
//!                    └─► combine_ndvi ───────► 5_NDVI_combinado.tif
//!                                                   │
//! MNC_invierno / MNC_verano ─► class_presence ◄─────┤──► 6_NDVI_con_mnc.tif
//!                                                   │
//! recorte_invierno / recorte_verano ─► compare ─────┤──► 7_ / 8_ reports
//!                                    └► merge_clipped ─► 9_NDVI_con_recortes.tif
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{season_series, GridProcessorConfig, Season};
//!
//! let config = GridProcessorConfig::from_env();
//! let series = season_series(Season::Winter, &mnc, &ndvi_files, &style, &config, &())?;
//! for summary in series.summarize() {
//!     println!("{}: {:?}", summary.label, summary.mean);
//! }
//! ```

pub mod compare;
pub mod config;
pub mod error;
pub mod indices;
pub mod mask;
pub mod merge;
pub mod progress;
pub mod projection;
pub mod series;
pub mod stack;
pub mod types;
pub mod verify;
pub mod zonal;

// Re-export commonly used types at crate root
pub use compare::{
    compare_properties, write_properties_csv, ComparisonReport, PropertyComparison,
    RasterProperties,
};
pub use config::GridProcessorConfig;
pub use error::{GridProcessorError, Result};
pub use indices::{ndvi, ndvi_from_scene, normalized_difference};
pub use mask::{class_presence, presence_band, PresenceReport};
pub use merge::{merge_clipped, MergeReport};
pub use progress::Progress;
pub use crate::projection::{
    bilinear_interpolate, cubic_interpolate, nearest_interpolate, resample_grid, warp_to_grid,
    warp_window,
};
pub use series::{month_label, season_series, NdviByClass, SeasonSeries, SeriesSummary};
pub use stack::{combine_ndvi, nan_stats, stack_statistics, CombineReport, STAT_BAND_NAMES};
pub use types::{GridRaster, InterpolationMethod, Season};
pub use verify::{verify_consistency, ConsistencyReport, RequiredAction};
pub use zonal::{zonal_class_means, ZonalStats};
