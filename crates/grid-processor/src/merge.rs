//! Merge the clipped crop maps with the combined NDVI stack.

use crate::error::{GridProcessorError, Result};
use crate::progress::Progress;
use crate::types::Season;
use geotiff_io::{read_all_bands, read_band, read_info, write_band_names, GeoTiffWriter, RasterBand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of [`merge_clipped`].
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    pub band_names: Vec<String>,
    /// Non-NaN pixels of the winter and summer bands
    pub winter_valid: usize,
    pub summer_valid: usize,
}

/// Write `[invierno, verano, <reference bands...>]` as float32 with NaN
/// nodata.
///
/// Both clipped rasters must have the size and CRS of `reference`;
/// otherwise nothing is written. Their nodata values become NaN. Reference
/// bands keep their descriptions, or `Banda_<i>` when unnamed.
pub fn merge_clipped(
    reference: &Path,
    winter: &Path,
    summer: &Path,
    output: &Path,
    names_path: Option<&Path>,
    progress: &dyn Progress,
) -> Result<MergeReport> {
    let ref_info = read_info(reference)?;
    let ref_crs = ref_info
        .crs
        .ok_or_else(|| GridProcessorError::MissingCrs(reference.display().to_string()))?;

    let mut clipped = Vec::with_capacity(2);
    for (season, path) in [(Season::Winter, winter), (Season::Summer, summer)] {
        let info = read_info(path)?;
        if info.width != ref_info.width || info.height != ref_info.height {
            return Err(GridProcessorError::dimension_mismatch(format!(
                "{} is {}x{}, {} is {}x{}",
                info.file_name(),
                info.width,
                info.height,
                ref_info.file_name(),
                ref_info.width,
                ref_info.height
            )));
        }
        if info.epsg != ref_info.epsg {
            return Err(GridProcessorError::crs_mismatch(
                ref_info.crs_string(),
                format!("{} ({})", info.crs_string(), info.file_name()),
            ));
        }

        let mut band = read_band(path, 1)?;
        band.mask_nodata(info.nodata);
        let valid = band.valid_count(None);
        info!(
            season = %season,
            file = %info.file_name(),
            valid_pixels = valid,
            total_pixels = band.pixel_count(),
            "Read clipped crop map"
        );
        clipped.push((season, band, valid));
    }

    progress.start(ref_info.count as u64, "Reading NDVI bands");
    let (_, mut ndvi_bands) = read_all_bands(reference)?;
    for band in &mut ndvi_bands {
        band.mask_nodata(ref_info.nodata);
    }
    progress.advance(ref_info.count as u64);
    progress.finish();

    let band_names: Vec<String> = clipped
        .iter()
        .map(|(season, _, _)| season.label().to_string())
        .chain((1..=ref_info.count).map(|i| {
            ref_info
                .description(i)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Banda_{}", i))
        }))
        .collect();
    let bands: Vec<&RasterBand> = clipped
        .iter()
        .map(|(_, band, _)| band)
        .chain(ndvi_bands.iter())
        .collect();
    let named: Vec<(&str, &RasterBand)> = band_names
        .iter()
        .map(String::as_str)
        .zip(bands)
        .collect();

    GeoTiffWriter::new(ref_info.transform, ref_crs)
        .with_nodata(f64::NAN)
        .write(output, &named)?;
    if let Some(names_path) = names_path {
        write_band_names(names_path, &band_names)?;
    }

    info!(
        output = %output.display(),
        bands = band_names.len(),
        "Wrote merged raster"
    );

    Ok(MergeReport {
        output: output.to_path_buf(),
        width: ref_info.width,
        height: ref_info.height,
        band_names,
        winter_valid: clipped[0].2,
        summer_valid: clipped[1].2,
    })
}
