//! Interpolation methods for grid resampling.
//!
//! Positions are in pixel index space: the centre of pixel `(col, row)` is at
//! `(col, row)`, so a position is inside the grid when it lies within half a
//! pixel of some pixel centre.

use crate::types::InterpolationMethod;

/// True when `(x, y)` falls on a pixel of a `width` x `height` grid.
fn in_grid(width: usize, height: usize, x: f64, y: f64) -> bool {
    x.is_finite()
        && y.is_finite()
        && x >= -0.5
        && y >= -0.5
        && x < width as f64 - 0.5
        && y < height as f64 - 0.5
}

/// Nearest neighbor interpolation.
///
/// Returns the value of the pixel containing the position.
pub fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !in_grid(width, height, x, y) {
        return f32::NAN;
    }

    let col = ((x + 0.5).floor() as usize).min(width - 1);
    let row = ((y + 0.5).floor() as usize).min(height - 1);
    data[row * width + col]
}

/// Bilinear interpolation.
///
/// Smoothly interpolates between the four nearest pixel centres. Positions
/// in the outer half pixel are clamped to the edge.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !in_grid(width, height, x, y) {
        return f32::NAN;
    }

    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    // Handle NaN values - if any corner is NaN, return NaN
    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Bicubic interpolation.
///
/// Uses 16 surrounding points for smoother interpolation.
pub fn cubic_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !in_grid(width, height, x, y) {
        return f32::NAN;
    }

    let xi = x.floor() as i64;
    let yi = y.floor() as i64;

    let xf = (x - xi as f64) as f32;
    let yf = (y - yi as f64) as f32;

    let mut values = [[0.0f32; 4]; 4];

    for j in 0..4 {
        for i in 0..4 {
            let px = (xi + i - 1).clamp(0, width as i64 - 1) as usize;
            let py = (yi + j - 1).clamp(0, height as i64 - 1) as usize;
            let v = data[py * width + px];

            // If any value is NaN, fall back to bilinear
            if v.is_nan() {
                return bilinear_interpolate(data, width, height, x, y);
            }
            values[j as usize][i as usize] = v;
        }
    }

    let mut row_values = [0.0f32; 4];
    for j in 0..4 {
        row_values[j] = cubic_1d(values[j][0], values[j][1], values[j][2], values[j][3], xf);
    }

    cubic_1d(row_values[0], row_values[1], row_values[2], row_values[3], yf)
}

/// 1D cubic interpolation using Catmull-Rom spline.
fn cubic_1d(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}

/// Sample `data` at `(x, y)` with the given method.
pub fn interpolate(
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    method: InterpolationMethod,
) -> f32 {
    match method {
        InterpolationMethod::Nearest => nearest_interpolate(data, width, height, x, y),
        InterpolationMethod::Bilinear => bilinear_interpolate(data, width, height, x, y),
        InterpolationMethod::Cubic => cubic_interpolate(data, width, height, x, y),
    }
}

/// Resample a grid covering the same extent to a new size.
///
/// Destination pixel centres are mapped onto the source extent, so
/// shrinking a class raster with `Nearest` picks one source pixel per
/// destination pixel.
pub fn resample_grid(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    method: InterpolationMethod,
) -> Vec<f32> {
    let mut output = vec![f32::NAN; dst_width * dst_height];
    if src_width == 0 || src_height == 0 {
        return output;
    }

    let scale_x = src_width as f64 / dst_width.max(1) as f64;
    let scale_y = src_height as f64 / dst_height.max(1) as f64;

    for dy in 0..dst_height {
        for dx in 0..dst_width {
            let sx = (dx as f64 + 0.5) * scale_x - 0.5;
            let sy = (dy as f64 + 0.5) * scale_y - 0.5;
            output[dy * dst_width + dx] = interpolate(data, src_width, src_height, sx, sy, method);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];

        assert_eq!(nearest_interpolate(&data, 3, 3, 0.0, 0.0), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 1.0, 1.0), 5.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.4, 0.4), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.6, 0.6), 5.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, -0.4, 2.4), 7.0);
    }

    #[test]
    fn test_nearest_outside_is_nan() {
        let data = vec![1.0f32; 4];
        assert!(nearest_interpolate(&data, 2, 2, -0.6, 0.0).is_nan());
        assert!(nearest_interpolate(&data, 2, 2, 1.5, 0.0).is_nan());
        assert!(nearest_interpolate(&data, 2, 2, f64::NAN, 0.0).is_nan());
    }

    #[test]
    fn test_bilinear_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 0.0), 2.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0), 3.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 1.0), 4.0);

        let center = bilinear_interpolate(&data, 2, 2, 0.5, 0.5);
        assert!((center - 2.5).abs() < 0.001);

        // Outer half pixel clamps to the edge value
        assert_eq!(bilinear_interpolate(&data, 2, 2, -0.3, -0.3), 1.0);
    }

    #[test]
    fn test_bilinear_with_nan() {
        let data: Vec<f32> = vec![
            1.0, f32::NAN,
            3.0, 4.0,
        ];

        let result = bilinear_interpolate(&data, 2, 2, 0.5, 0.5);
        assert!(result.is_nan());
    }

    #[test]
    fn test_cubic_on_linear_ramp_is_exact() {
        let data: Vec<f32> = (0..16).map(|v| (v % 4) as f32).collect();
        let v = cubic_interpolate(&data, 4, 4, 1.5, 1.5);
        assert!((v - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_resample_grid_downscale_nearest() {
        let data: Vec<f32> = vec![
            1.0, 1.0, 2.0, 2.0,
            1.0, 1.0, 2.0, 2.0,
            3.0, 3.0, 4.0, 4.0,
            3.0, 3.0, 4.0, 4.0,
        ];

        let result = resample_grid(&data, 4, 4, 2, 2, InterpolationMethod::Nearest);
        assert_eq!(result, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_resample_identity() {
        let data: Vec<f32> = (0..9).map(|v| v as f32).collect();
        let result = resample_grid(&data, 3, 3, 3, 3, InterpolationMethod::Bilinear);
        assert_eq!(result, data);
    }
}
