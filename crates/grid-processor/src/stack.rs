//! Temporal statistics over the monthly NDVI rasters.
//!
//! All months must share one grid. Each pixel's series is reduced to its
//! NaN-aware median, minimum, maximum and population standard deviation,
//! and the combined raster stores those four bands ahead of the monthly
//! bands.

use crate::error::{GridProcessorError, Result};
use crate::progress::Progress;
use crate::series::month_label;
use crate::types::GridRaster;
use agro_common::{CrsCode, GeoTransform};
use geotiff_io::{write_band_names, GeoTiffWriter, RasterBand};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Names of the statistic bands, in output order.
pub const STAT_BAND_NAMES: [&str; 4] = ["mediana", "min", "max", "sd"];

/// Median, min, max and population standard deviation of the non-NaN
/// values. All four are NaN when every value is NaN.
pub fn nan_stats(values: &[f32]) -> [f32; 4] {
    let mut valid: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| *v as f64)
        .collect();
    if valid.is_empty() {
        return [f32::NAN; 4];
    }

    valid.sort_by(|a, b| a.total_cmp(b));
    let n = valid.len();
    let median = if n % 2 == 0 {
        (valid[n / 2 - 1] + valid[n / 2]) / 2.0
    } else {
        valid[n / 2]
    };
    let mean = valid.iter().sum::<f64>() / n as f64;
    let variance = valid.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;

    [
        median as f32,
        valid[0] as f32,
        valid[n - 1] as f32,
        variance.sqrt() as f32,
    ]
}

/// Per-pixel statistics of equally sized bands, returned in
/// [`STAT_BAND_NAMES`] order.
pub fn stack_statistics(bands: &[RasterBand]) -> Result<[RasterBand; 4]> {
    let Some(first) = bands.first() else {
        return Err(GridProcessorError::NoInputs("no bands to reduce".to_string()));
    };
    let (width, height) = (first.width, first.height);
    if let Some(band) = bands.iter().find(|b| b.width != width || b.height != height) {
        return Err(GridProcessorError::dimension_mismatch(format!(
            "band is {}x{}, expected {}x{}",
            band.width, band.height, width, height
        )));
    }

    let stats: Vec<[f32; 4]> = (0..width * height)
        .into_par_iter()
        .map_init(
            || Vec::with_capacity(bands.len()),
            |series, i| {
                series.clear();
                series.extend(bands.iter().map(|b| b.data[i]));
                nan_stats(series)
            },
        )
        .collect();

    let band = |k: usize| RasterBand::new(stats.iter().map(|s| s[k]).collect(), width, height);
    Ok([band(0), band(1), band(2), band(3)])
}

/// Grid of the first readable input.
struct Reference {
    path: PathBuf,
    width: usize,
    height: usize,
    raster_transform: GeoTransform,
    crs: CrsCode,
    nodata: Option<f64>,
}

/// Outcome of [`combine_ndvi`].
#[derive(Debug, Clone, Serialize)]
pub struct CombineReport {
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    /// Names of every written band, in order
    pub band_names: Vec<String>,
    /// Files that could not be read, with the reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// Stack the monthly NDVI files into one multi-band raster.
///
/// Output bands are `mediana, min, max, sd` followed by `NDVI_<month>` per
/// input, float32 with NaN nodata. Unreadable files are skipped; a file
/// whose size differs from the first readable one is an error. When
/// `names_path` is given the band list is also written there as
/// `Banda i: name` lines.
pub fn combine_ndvi(
    files: &[PathBuf],
    output: &Path,
    names_path: Option<&Path>,
    progress: &dyn Progress,
) -> Result<CombineReport> {
    if files.is_empty() {
        return Err(GridProcessorError::NoInputs("no NDVI files to combine".to_string()));
    }

    progress.start(files.len() as u64, "Reading rasters");
    let mut reference: Option<Reference> = None;
    let mut month_names: Vec<String> = Vec::with_capacity(files.len());
    let mut monthly: Vec<RasterBand> = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();

    for path in files {
        let mut raster = match GridRaster::open_ndvi(path) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable NDVI raster");
                skipped.push((path.clone(), e.to_string()));
                progress.advance(1);
                continue;
            }
        };

        if let Some(reference) = &reference {
            if raster.width() != reference.width || raster.height() != reference.height {
                return Err(GridProcessorError::dimension_mismatch(format!(
                    "{} is {}x{}, {} is {}x{}",
                    path.display(),
                    raster.width(),
                    raster.height(),
                    reference.path.display(),
                    reference.width,
                    reference.height
                )));
            }
            // The reference nodata wins when it exists.
            if reference.nodata.is_some() {
                raster.nodata = reference.nodata;
            }
        }
        if reference.is_none() {
            reference = Some(Reference {
                path: path.clone(),
                width: raster.width(),
                height: raster.height(),
                raster_transform: raster.transform,
                crs: raster.require_crs()?,
                nodata: raster.nodata,
            });
        }

        raster.mask_nodata();
        month_names.push(format!("NDVI_{}", month_label(path)));
        monthly.push(raster.band);
        progress.advance(1);
    }
    progress.finish();

    let Some(reference) = reference else {
        return Err(GridProcessorError::NoInputs(
            "none of the NDVI files could be read".to_string(),
        ));
    };

    let stats = stack_statistics(&monthly)?;

    let mut named: Vec<(&str, &RasterBand)> = STAT_BAND_NAMES
        .iter()
        .copied()
        .zip(stats.iter())
        .collect();
    named.extend(month_names.iter().map(String::as_str).zip(monthly.iter()));

    GeoTiffWriter::new(reference.raster_transform, reference.crs)
        .with_nodata(f64::NAN)
        .write(output, &named)?;

    let band_names: Vec<String> = named.iter().map(|(n, _)| n.to_string()).collect();
    if let Some(names_path) = names_path {
        write_band_names(names_path, &band_names)?;
    }

    info!(
        output = %output.display(),
        bands = band_names.len(),
        months = monthly.len(),
        skipped = skipped.len(),
        "Wrote combined NDVI raster"
    );

    Ok(CombineReport {
        output: output.to_path_buf(),
        width: reference.width,
        height: reference.height,
        band_names,
        skipped,
    })
}
