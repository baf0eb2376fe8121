//! Crop-class raster previews coloured with a land-cover style.

use agro_common::LandCoverStyle;
use geotiff_io::RasterBand;
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Colour each pixel with its class colour from `style`.
///
/// NaN pixels, values the style does not list and the no-data class are
/// transparent.
pub fn render_classes(band: &RasterBand, style: &LandCoverStyle) -> RgbaImage {
    let mut pixels = vec![0u8; band.width * band.height * 4];
    pixels
        .par_chunks_mut(4)
        .zip(band.data.par_iter())
        .for_each(|(px, value)| {
            if value.is_nan() {
                return;
            }
            let (r, g, b, a) = style.color_for(value.round() as i64).to_rgba();
            px.copy_from_slice(&[r, g, b, a]);
        });

    // The buffer always matches width * height * 4
    RgbaImage::from_raw(band.width as u32, band.height as u32, pixels)
        .unwrap_or_else(|| RgbaImage::new(band.width as u32, band.height as u32))
}

/// Pixel count per class value present in `band`, NaN skipped.
pub fn class_counts(band: &RasterBand) -> BTreeMap<i64, u64> {
    let mut counts = BTreeMap::new();
    for v in band.data.iter().filter(|v| !v.is_nan()) {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    counts
}
