//! Shared test utilities for the agromodel workspace.
//!
//! Synthetic NDVI and crop-class grids, fixtures mirroring the real inputs,
//! GeoTIFF writers for test rasters and approximate-equality assertions.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, write_ndvi_month};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for comparing raster samples where NaN equals NaN.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_samples_eq;
///
/// assert_samples_eq!(&[1.0, f32::NAN], &[1.0, f32::NAN], 1e-6);
/// ```
#[macro_export]
macro_rules! assert_samples_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f32] = $left;
        let right: &[f32] = $right;
        assert_eq!(left.len(), right.len(), "sample counts differ");
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let same = (l.is_nan() && r.is_nan()) || (l - r).abs() as f64 <= $epsilon as f64;
            if !same {
                panic!("samples differ at index {}: left `{}`, right `{}`", i, l, r);
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_samples_eq_nan_aware() {
        assert_samples_eq!(&[0.5, f32::NAN], &[0.5000001, f32::NAN], 1e-5);
    }

    #[test]
    #[should_panic(expected = "samples differ")]
    fn test_assert_samples_eq_fails() {
        assert_samples_eq!(&[0.5, f32::NAN], &[0.5, 0.0], 1e-5);
    }

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }
}
