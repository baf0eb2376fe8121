//! Synthetic raster generators.
//!
//! These generators create predictable, verifiable NDVI and crop-class
//! patterns that can be used across the test suite.

/// Creates an NDVI-like gradient from bare soil (top-left, ~0.1) to dense
/// canopy (bottom-right, ~0.85).
pub fn create_ndvi_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(0.1 + 0.375 * x_factor + 0.375 * y_factor);
        }
    }
    data
}

/// Creates a crop-class grid of vertical stripes, cycling through `classes`
/// every `stripe` columns.
///
/// # Example
///
/// ```
/// use test_utils::create_class_stripes;
///
/// let grid = create_class_stripes(4, 2, &[10, 20], 2);
/// assert_eq!(grid, vec![10.0, 10.0, 20.0, 20.0, 10.0, 10.0, 20.0, 20.0]);
/// ```
pub fn create_class_stripes(width: usize, height: usize, classes: &[i64], stripe: usize) -> Vec<f32> {
    let stripe = stripe.max(1);
    let mut data = Vec::with_capacity(width * height);
    for _ in 0..height {
        for col in 0..width {
            let class = if classes.is_empty() {
                0
            } else {
                classes[(col / stripe) % classes.len()]
            };
            data.push(class as f32);
        }
    }
    data
}

/// Creates a grid with constant values.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a 13-band Sentinel-2-like reflectance stack where band 4 (red)
/// and band 8 (NIR) produce a known NDVI of `ndvi` everywhere.
///
/// Returned bands are in Sentinel-2 order B1..B12, QA60 (13 bands, the
/// band list of the full-scene export without B8A).
pub fn create_sentinel_bands(width: usize, height: usize, ndvi: f32) -> Vec<Vec<f32>> {
    // With red = 1000, NIR solves (nir - red) / (nir + red) = ndvi.
    let red = 1000.0_f32;
    let nir = red * (1.0 + ndvi) / (1.0 - ndvi);
    (1..=13)
        .map(|b| match b {
            4 => vec![red; width * height],
            8 => vec![nir; width * height],
            _ => vec![500.0 + b as f32; width * height],
        })
        .collect()
}
