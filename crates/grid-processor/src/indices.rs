//! Spectral indices from Sentinel-2 reflectance bands.

use crate::error::{GridProcessorError, Result};
use geotiff_io::{read_info, read_band, GeoTiffWriter, RasterBand};
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

/// 1-based band of B4 (red) in the 13-band scene.
pub const SENTINEL2_RED_BAND: usize = 4;

/// 1-based band of B8 (near infrared) in the 13-band scene.
pub const SENTINEL2_NIR_BAND: usize = 8;

/// `(a - b) / (a + b)` per pixel.
///
/// Pixels where either input is NaN or the sum is zero are NaN.
pub fn normalized_difference(a: &RasterBand, b: &RasterBand) -> Result<RasterBand> {
    if a.width != b.width || a.height != b.height {
        return Err(GridProcessorError::dimension_mismatch(format!(
            "bands are {}x{} and {}x{}",
            a.width, a.height, b.width, b.height
        )));
    }

    let data: Vec<f32> = a
        .data
        .par_iter()
        .zip(b.data.par_iter())
        .map(|(&a, &b)| {
            if a.is_nan() || b.is_nan() {
                return f32::NAN;
            }
            let sum = a as f64 + b as f64;
            if sum.abs() < 1e-10 {
                return f32::NAN;
            }
            ((a as f64 - b as f64) / sum) as f32
        })
        .collect();

    Ok(RasterBand::new(data, a.width, a.height))
}

/// NDVI = (NIR - Red) / (NIR + Red).
pub fn ndvi(nir: &RasterBand, red: &RasterBand) -> Result<RasterBand> {
    normalized_difference(nir, red)
}

/// NDVI of a 13-band Sentinel-2 scene (B8 and B4), written to `output` as
/// a single float32 band named `NDVI` with NaN nodata.
pub fn ndvi_from_scene(scene: &Path, output: &Path) -> Result<RasterBand> {
    let info = read_info(scene)?;
    if info.count < SENTINEL2_NIR_BAND {
        return Err(GridProcessorError::invalid_input(format!(
            "{} has {} bands, expected the 13-band Sentinel-2 scene",
            info.file_name(),
            info.count
        )));
    }
    let crs = info
        .crs
        .ok_or_else(|| GridProcessorError::MissingCrs(scene.display().to_string()))?;

    let mut nir = read_band(scene, SENTINEL2_NIR_BAND)?;
    let mut red = read_band(scene, SENTINEL2_RED_BAND)?;
    nir.mask_nodata(info.nodata);
    red.mask_nodata(info.nodata);

    let band = ndvi(&nir, &red)?;
    GeoTiffWriter::new(info.transform, crs)
        .with_nodata(f64::NAN)
        .write(output, &[("NDVI", &band)])?;

    info!(
        scene = %scene.display(),
        output = %output.display(),
        valid_pixels = band.valid_count(None),
        "Derived NDVI from scene"
    );
    Ok(band)
}
