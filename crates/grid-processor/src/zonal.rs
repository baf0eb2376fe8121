//! Mean NDVI per crop class.
//!
//! The class raster defines the grid. NDVI is masked for nodata, warped onto
//! each class window and accumulated per class value. A window that fails
//! to warp is logged and skipped so one bad block does not lose a month.

use crate::config::GridProcessorConfig;
use crate::error::Result;
use crate::progress::Progress;
use crate::projection::warp_window;
use crate::types::GridRaster;
use agro_common::chunk_windows;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Running sum for a mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    pub sum: f64,
    pub count: u64,
}

impl MeanAccumulator {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &MeanAccumulator) {
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean, or `None` when nothing was accumulated.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Result of [`zonal_class_means`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ZonalStats {
    /// Mean NDVI per requested class; `None` when no valid pixel was found
    pub means: BTreeMap<i64, Option<f64>>,
    /// Valid pixels per requested class
    pub counts: BTreeMap<i64, u64>,
    /// Windows skipped because they could not be processed
    pub failed_windows: usize,
}

/// Mean of valid `ndvi` pixels under each class in `class_values`.
///
/// Classes listed in `config.exclude_values` are skipped even when requested.
/// A pixel counts when its class sample equals the class value and its NDVI
/// sample is neither NaN nor the NDVI nodata value.
pub fn zonal_class_means(
    classes: &GridRaster,
    mut ndvi: GridRaster,
    class_values: &[i64],
    config: &GridProcessorConfig,
    progress: &dyn Progress,
) -> Result<ZonalStats> {
    let class_crs = classes.require_crs()?;
    ndvi.mask_nodata();

    let mut accumulators: BTreeMap<i64, MeanAccumulator> = class_values
        .iter()
        .filter(|v| !config.is_excluded(**v))
        .map(|v| (*v, MeanAccumulator::default()))
        .collect();

    let windows = chunk_windows(classes.width(), classes.height(), config.chunk_size);
    progress.start(windows.len() as u64, &ndvi.path.display().to_string());

    let mut failed_windows = 0;
    for window in &windows {
        let ndvi_block = match warp_window(
            &ndvi,
            &classes.transform,
            class_crs,
            window,
            config.interpolation,
            f32::NAN,
        ) {
            Ok(block) => block,
            Err(e) => {
                warn!(
                    col_off = window.col_off,
                    row_off = window.row_off,
                    error = %e,
                    "Skipping window that could not be warped"
                );
                failed_windows += 1;
                progress.advance(1);
                continue;
            }
        };
        let class_block = classes.band.window(window, f32::NAN);

        for (class, value) in class_block.data.iter().zip(ndvi_block.data.iter()) {
            if class.is_nan() || value.is_nan() {
                continue;
            }
            if let Some(acc) = accumulators.get_mut(&(class.round() as i64)) {
                acc.add(*value as f64);
            }
        }
        progress.advance(1);
    }
    progress.finish();

    let stats = ZonalStats {
        means: accumulators.iter().map(|(k, a)| (*k, a.mean())).collect(),
        counts: accumulators.iter().map(|(k, a)| (*k, a.count)).collect(),
        failed_windows,
    };
    debug!(
        ndvi = %ndvi.path.display(),
        classes = stats.means.len(),
        windows = windows.len(),
        failed_windows = failed_windows,
        "Computed zonal class means"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::testing::CountingProgress;
    use agro_common::{CrsCode, GeoTransform};
    use geotiff_io::RasterBand;
    use std::sync::atomic::Ordering;

    const UTM_21S: CrsCode = CrsCode::Utm {
        zone: 21,
        south: true,
    };

    fn grid() -> GeoTransform {
        GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0)
    }

    #[test]
    fn test_mean_accumulator() {
        let mut a = MeanAccumulator::default();
        assert_eq!(a.mean(), None);
        a.add(0.2);
        a.add(0.4);
        let mut b = MeanAccumulator::default();
        b.add(0.6);
        a.merge(&b);
        assert!((a.mean().unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_means_per_class_across_windows() {
        // Classes: left half 10, right half 12, last row nodata
        let classes = RasterBand::new(
            vec![
                10.0, 10.0, 12.0, 12.0, //
                10.0, 10.0, 12.0, 12.0, //
                255.0, 255.0, 255.0, 255.0,
            ],
            4,
            3,
        );
        let ndvi = RasterBand::new(
            vec![
                0.2, 0.4, 0.8, -9999.0, //
                0.3, f32::NAN, 0.6, 0.7, //
                0.9, 0.9, 0.9, 0.9,
            ],
            4,
            3,
        );
        let classes = GridRaster::from_band(classes, grid(), UTM_21S, Some(255.0));
        let ndvi = GridRaster::from_band(ndvi, grid(), UTM_21S, Some(-9999.0));

        let config = GridProcessorConfig {
            chunk_size: 2,
            ..Default::default()
        };
        let progress = CountingProgress::default();
        let stats = zonal_class_means(&classes, ndvi, &[0, 10, 11, 12, 255], &config, &progress).unwrap();

        assert_eq!(stats.means.len(), 3);
        assert!((stats.means[&10].unwrap() - 0.3).abs() < 1e-6);
        assert!((stats.means[&12].unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(stats.means[&11], None);
        assert_eq!(stats.counts[&10], 3);
        assert_eq!(stats.counts[&12], 3);
        assert_eq!(stats.failed_windows, 0);

        assert_eq!(progress.total.load(Ordering::SeqCst), 4);
        assert_eq!(progress.done.load(Ordering::SeqCst), 4);
        assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ndvi_on_coarser_grid_is_resampled() {
        let classes = GridRaster::from_band(RasterBand::filled(4, 4, 21.0), grid(), UTM_21S, None);
        let coarse = GeoTransform::new(200_000.0, 5_760_000.0, 20.0, -20.0);
        let ndvi = GridRaster::from_band(RasterBand::filled(2, 2, 0.5), coarse, UTM_21S, None);

        let stats = zonal_class_means(&classes, ndvi, &[21], &GridProcessorConfig::default(), &())
            .unwrap();
        assert!((stats.means[&21].unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(stats.counts[&21], 16);
    }

    #[test]
    fn test_failed_windows_are_skipped() {
        let classes = GridRaster::from_band(RasterBand::filled(2, 2, 10.0), grid(), UTM_21S, None);
        let mut ndvi = GridRaster::from_band(
            RasterBand::filled(2, 2, 0.5),
            GeoTransform::new(0.0, 0.0, 1.0, -1.0),
            UTM_21S,
            None,
        );
        ndvi.crs = None;

        let stats = zonal_class_means(&classes, ndvi, &[10], &GridProcessorConfig::default(), &())
            .unwrap();
        assert_eq!(stats.failed_windows, 1);
        assert_eq!(stats.means[&10], None);
    }
}
