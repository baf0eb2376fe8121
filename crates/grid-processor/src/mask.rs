//! Crop-class presence bands on the combined NDVI grid.
//!
//! The winter and summer crop maps are warped (nearest neighbour) onto the
//! grid of the combined NDVI raster window by window and reduced to binary
//! bands: 1 where the pixel holds a crop class, 0 elsewhere.

use crate::config::GridProcessorConfig;
use crate::error::Result;
use crate::progress::Progress;
use crate::projection::warp_window;
use crate::types::{GridRaster, InterpolationMethod, Season};
use agro_common::{chunk_windows, CrsCode, GeoTransform};
use geotiff_io::{read_all_bands, write_band_names, GeoTiffWriter, RasterBand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// True when a class sample marks a crop: not NaN, not excluded and not the
/// raster's nodata value.
pub fn is_present(value: f32, nodata: Option<f64>, exclude: &[i64]) -> bool {
    if value.is_nan() {
        return false;
    }
    if let Some(nd) = nodata {
        if !nd.is_nan() && value == nd as f32 {
            return false;
        }
    }
    !exclude.contains(&(value.round() as i64))
}

/// Binary presence band of `classes` on a `width` x `height` grid, and the
/// number of pixels set to 1.
///
/// Windows that fail to warp are logged and left at 0.
pub fn presence_band(
    classes: &GridRaster,
    dst_transform: &GeoTransform,
    dst_crs: CrsCode,
    width: usize,
    height: usize,
    config: &GridProcessorConfig,
    progress: &dyn Progress,
) -> Result<(RasterBand, u64)> {
    let mut out = RasterBand::filled(width, height, 0.0);
    let mut present = 0u64;

    let windows = chunk_windows(width, height, config.chunk_size);
    progress.start(windows.len() as u64, &classes.path.display().to_string());
    for window in &windows {
        // Pixels outside the crop map read as 0, an excluded value.
        let block = match warp_window(
            classes,
            dst_transform,
            dst_crs,
            window,
            InterpolationMethod::Nearest,
            0.0,
        ) {
            Ok(block) => block,
            Err(e) => {
                warn!(
                    col_off = window.col_off,
                    row_off = window.row_off,
                    error = %e,
                    "Skipping window that could not be warped"
                );
                progress.advance(1);
                continue;
            }
        };

        let mut binary = RasterBand::filled(block.width, block.height, 0.0);
        for (dst, v) in binary.data.iter_mut().zip(block.data.iter()) {
            if is_present(*v, classes.nodata, &config.exclude_values) {
                *dst = 1.0;
                present += 1;
            }
        }
        out.write_window(window, &binary);
        progress.advance(1);
    }
    progress.finish();

    Ok((out, present))
}

/// Outcome of [`class_presence`].
#[derive(Debug, Clone, Serialize)]
pub struct PresenceReport {
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    pub band_names: Vec<String>,
    pub winter_pixels: u64,
    pub summer_pixels: u64,
}

impl PresenceReport {
    pub fn total_pixels(&self) -> u64 {
        (self.width * self.height) as u64
    }

    /// Pixels with a crop class in `season`.
    pub fn pixels(&self, season: Season) -> u64 {
        match season {
            Season::Winter => self.winter_pixels,
            Season::Summer => self.summer_pixels,
        }
    }

    /// Share of the grid covered by crop classes in `season`, in percent.
    pub fn percent(&self, season: Season) -> f64 {
        let total = self.total_pixels();
        if total == 0 {
            0.0
        } else {
            100.0 * self.pixels(season) as f64 / total as f64
        }
    }
}

/// Append winter and summer presence bands to the combined NDVI raster.
///
/// The output holds every band of `reference` (named by its descriptions,
/// or `Banda_<i>` when missing) followed by `invierno` and `verano`.
pub fn class_presence(
    reference: &Path,
    winter: &Path,
    summer: &Path,
    output: &Path,
    names_path: Option<&Path>,
    config: &GridProcessorConfig,
    progress: &dyn Progress,
) -> Result<PresenceReport> {
    let (info, ndvi_bands) = read_all_bands(reference)?;
    let ref_crs = info
        .crs
        .ok_or_else(|| crate::GridProcessorError::MissingCrs(reference.display().to_string()))?;
    info!(
        reference = %reference.display(),
        width = info.width,
        height = info.height,
        bands = info.count,
        crs = %info.crs_string(),
        "Read reference grid"
    );

    let mut band_names: Vec<String> = (1..=info.count)
        .map(|i| {
            info.description(i)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Banda_{}", i))
        })
        .collect();

    let mut presence = Vec::with_capacity(2);
    for (season, path) in [(Season::Winter, winter), (Season::Summer, summer)] {
        let classes = GridRaster::open(path, 1)?;
        let (band, count) = presence_band(
            &classes,
            &info.transform,
            ref_crs,
            info.width,
            info.height,
            config,
            progress,
        )?;
        info!(
            season = %season,
            valid_pixels = count,
            "Built class presence band"
        );
        band_names.push(season.label().to_string());
        presence.push((band, count));
    }

    let named: Vec<(&str, &RasterBand)> = band_names
        .iter()
        .map(String::as_str)
        .zip(ndvi_bands.iter().chain(presence.iter().map(|(b, _)| b)))
        .collect();

    let mut writer = GeoTiffWriter::new(info.transform, ref_crs);
    if let Some(nodata) = info.nodata {
        writer = writer.with_nodata(nodata);
    }
    writer.write(output, &named)?;

    if let Some(names_path) = names_path {
        write_band_names(names_path, &band_names)?;
    }

    Ok(PresenceReport {
        output: output.to_path_buf(),
        width: info.width,
        height: info.height,
        band_names,
        winter_pixels: presence[0].1,
        summer_pixels: presence[1].1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTM_21S: CrsCode = CrsCode::Utm {
        zone: 21,
        south: true,
    };

    #[test]
    fn test_is_present() {
        let exclude = [0, 255];
        assert!(is_present(10.0, Some(255.0), &exclude));
        assert!(!is_present(0.0, None, &exclude));
        assert!(!is_present(255.0, None, &exclude));
        assert!(!is_present(f32::NAN, None, &exclude));
        assert!(!is_present(99.0, Some(99.0), &exclude));
        assert!(is_present(99.0, Some(f64::NAN), &exclude));
    }

    #[test]
    fn test_presence_band_counts() {
        let gt = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        let classes = GridRaster::from_band(
            RasterBand::new(vec![10.0, 0.0, 255.0, 12.0, 12.0, 200.0], 3, 2),
            gt,
            UTM_21S,
            Some(200.0),
        );
        let config = GridProcessorConfig {
            chunk_size: 2,
            ..Default::default()
        };

        let (band, count) = presence_band(&classes, &gt, UTM_21S, 3, 2, &config, &()).unwrap();
        assert_eq!(band.data, vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_pixels_outside_class_map_are_absent() {
        let dst = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        // Class map covers only the left column of the destination
        let src = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        let classes = GridRaster::from_band(RasterBand::filled(1, 2, 10.0), src, UTM_21S, None);

        let (band, count) = presence_band(&classes, &dst, UTM_21S, 2, 2, &GridProcessorConfig::default(), &())
            .unwrap();
        assert_eq!(band.data, vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_report_percent() {
        let report = PresenceReport {
            output: PathBuf::new(),
            width: 10,
            height: 10,
            band_names: vec![],
            winter_pixels: 25,
            summer_pixels: 0,
        };
        assert_eq!(report.percent(Season::Winter), 25.0);
        assert_eq!(report.percent(Season::Summer), 0.0);
    }
}
