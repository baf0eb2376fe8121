//! Warping rasters onto a reference grid.
//!
//! The class raster (or the combined NDVI stack) defines the reference grid.
//! Other rasters are resampled onto it one window at a time: the window's
//! extent is transformed into the source CRS to find the source pixels it
//! needs, then every destination pixel centre is mapped back into the
//! source and interpolated.

use super::interpolation::interpolate;
use crate::error::Result;
use crate::types::{GridRaster, InterpolationMethod};
use agro_common::{CrsCode, GeoTransform, Window};
use geotiff_io::RasterBand;
use projection::transform::{Transformer, DEFAULT_DENSIFY_POINTS};
use projection::transform_bounds;
use rayon::prelude::*;
use tracing::trace;

/// Extra source pixels read around the projected window so interpolation
/// kernels near the window edge see their neighbours.
const SOURCE_MARGIN: i64 = 2;

/// Values of `src` resampled onto `window` of the grid described by
/// `dst_transform` and `dst_crs`.
///
/// Destination pixels that fall outside the source, or whose interpolated
/// value is NaN, are set to `fill`. When the source already shares the
/// destination grid the window is copied without resampling.
pub fn warp_window(
    src: &GridRaster,
    dst_transform: &GeoTransform,
    dst_crs: CrsCode,
    window: &Window,
    method: InterpolationMethod,
    fill: f32,
) -> Result<RasterBand> {
    if window.is_empty() {
        return Ok(RasterBand::filled(window.width, window.height, fill));
    }

    if src.crs == Some(dst_crs) && src.transform.approx_eq(dst_transform, 1e-9) {
        let mut block = src.band.window(window, fill);
        replace_nan(&mut block, fill);
        return Ok(block);
    }

    let src_crs = src.require_crs()?;
    let dst_bounds = window.bounds(dst_transform);
    let src_bounds = transform_bounds(dst_crs, src_crs, &dst_bounds, DEFAULT_DENSIFY_POINTS)?;

    let needed = Window::from_bounds(&src_bounds, &src.transform);
    let padded = Window::new(
        needed.col_off - SOURCE_MARGIN,
        needed.row_off - SOURCE_MARGIN,
        needed.width + 2 * SOURCE_MARGIN as usize,
        needed.height + 2 * SOURCE_MARGIN as usize,
    );
    let Some(src_window) = padded.intersect(&Window::full(src.width(), src.height())) else {
        trace!(?window, "Window does not overlap the source raster");
        return Ok(RasterBand::filled(window.width, window.height, fill));
    };

    let block = src.band.window(&src_window, f32::NAN);
    let transformer = Transformer::new(dst_crs, src_crs);
    let mut out = RasterBand::filled(window.width, window.height, fill);

    out.data
        .par_chunks_mut(window.width)
        .enumerate()
        .for_each(|(r, row)| {
            let dst_row = (window.row_off + r as i64) as f64 + 0.5;
            for (c, value) in row.iter_mut().enumerate() {
                let dst_col = (window.col_off + c as i64) as f64 + 0.5;
                let (x, y) = dst_transform.pixel_to_geo_f(dst_col, dst_row);
                let (sx, sy) = transformer.apply(x, y);
                let (pc, pr) = src.transform.geo_to_pixel(sx, sy);

                // Pixel index space of the extracted block
                let bx = pc - 0.5 - src_window.col_off as f64;
                let by = pr - 0.5 - src_window.row_off as f64;
                let v = interpolate(&block.data, block.width, block.height, bx, by, method);
                if !v.is_nan() {
                    *value = v;
                }
            }
        });

    Ok(out)
}

/// Warp a whole raster onto a `width` x `height` reference grid.
pub fn warp_to_grid(
    src: &GridRaster,
    dst_transform: &GeoTransform,
    dst_crs: CrsCode,
    width: usize,
    height: usize,
    method: InterpolationMethod,
    fill: f32,
) -> Result<RasterBand> {
    warp_window(
        src,
        dst_transform,
        dst_crs,
        &Window::full(width, height),
        method,
        fill,
    )
}

fn replace_nan(band: &mut RasterBand, fill: f32) {
    if fill.is_nan() {
        return;
    }
    for v in band.data.iter_mut().filter(|v| v.is_nan()) {
        *v = fill;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTM_21S: CrsCode = CrsCode::Utm {
        zone: 21,
        south: true,
    };

    fn ramp(width: usize, height: usize) -> RasterBand {
        RasterBand::new((0..width * height).map(|v| v as f32).collect(), width, height)
    }

    #[test]
    fn test_same_grid_copies_window() {
        let gt = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        let src = GridRaster::from_band(ramp(4, 4), gt, UTM_21S, None);
        let out = warp_window(
            &src,
            &gt,
            UTM_21S,
            &Window::new(2, 2, 3, 3),
            InterpolationMethod::Bilinear,
            -1.0,
        )
        .unwrap();
        assert_eq!(out.data, vec![10.0, 11.0, -1.0, 14.0, 15.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_shifted_grid_nearest() {
        // Same CRS, destination shifted by exactly one pixel east
        let src_gt = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        let dst_gt = GeoTransform::new(200_010.0, 5_760_000.0, 10.0, -10.0);
        let src = GridRaster::from_band(ramp(4, 2), src_gt, UTM_21S, None);

        let out = warp_to_grid(&src, &dst_gt, UTM_21S, 4, 2, InterpolationMethod::Nearest, f32::NAN)
            .unwrap();
        assert_eq!(&out.data[0..3], &[1.0, 2.0, 3.0]);
        assert!(out.data[3].is_nan());
        assert_eq!(&out.data[4..7], &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_finer_grid_bilinear() {
        // 2x2 source at 20 m resampled to 4x4 at 10 m over the same extent
        let src_gt = GeoTransform::new(0.0, 40.0, 20.0, -20.0);
        let dst_gt = GeoTransform::new(0.0, 40.0, 10.0, -10.0);
        let src = GridRaster::from_band(
            RasterBand::new(vec![0.0, 1.0, 2.0, 3.0], 2, 2),
            src_gt,
            UTM_21S,
            None,
        );

        let out = warp_to_grid(&src, &dst_gt, UTM_21S, 4, 4, InterpolationMethod::Bilinear, f32::NAN)
            .unwrap();
        // Outer pixels clamp to the corner values, inner ones blend
        assert_eq!(out.data[0], 0.0);
        assert_eq!(out.data[15], 3.0);
        assert!((out.data[5] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_no_overlap_is_filled() {
        let src_gt = GeoTransform::new(0.0, 100.0, 10.0, -10.0);
        let dst_gt = GeoTransform::new(10_000.0, 10_100.0, 10.0, -10.0);
        let src = GridRaster::from_band(ramp(10, 10), src_gt, UTM_21S, None);

        let out = warp_to_grid(&src, &dst_gt, UTM_21S, 5, 5, InterpolationMethod::Nearest, 255.0)
            .unwrap();
        assert!(out.data.iter().all(|v| *v == 255.0));
    }

    #[test]
    fn test_cross_crs_warp_hits_source() {
        // Source in Gauss-Krüger zone 5, destination in UTM 21S around Tres Arroyos
        let gk = CrsCode::GaussKruger { zone: 5 };
        let (gx, gy) = projection::transform_point(UTM_21S, gk, 213_514.83, 5_747_694.90).unwrap();
        let src_gt = GeoTransform::new(gx - 500.0, gy + 500.0, 100.0, -100.0);
        let src = GridRaster::from_band(RasterBand::filled(10, 10, 12.0), src_gt, gk, Some(255.0));

        let dst_gt = GeoTransform::new(213_514.83 - 100.0, 5_747_694.90 + 100.0, 10.0, -10.0);
        let out = warp_to_grid(&src, &dst_gt, UTM_21S, 20, 20, InterpolationMethod::Nearest, 255.0)
            .unwrap();
        assert!(out.data.iter().all(|v| *v == 12.0));
    }

    #[test]
    fn test_source_without_crs_is_error() {
        let mut src = GridRaster::from_band(ramp(2, 2), GeoTransform::default(), UTM_21S, None);
        src.crs = None;
        let dst_gt = GeoTransform::new(5.0, 5.0, 1.0, -1.0);
        assert!(warp_to_grid(&src, &dst_gt, UTM_21S, 2, 2, InterpolationMethod::Nearest, 0.0).is_err());
    }
}
