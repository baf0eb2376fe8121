//! Raster grid georeferencing: affine transforms and pixel windows.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// Affine transformation between pixel and map coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up rasters the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a north-up transform with no rotation.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Transform that maps a `width` x `height` grid onto `bbox`.
    pub fn from_bounds(bbox: &BoundingBox, width: usize, height: usize) -> Self {
        Self::new(
            bbox.min_x,
            bbox.max_y,
            bbox.width() / width as f64,
            -bbox.height() / height as f64,
        )
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Map coordinates of a pixel center.
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_geo_f(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of a fractional pixel position (0,0 is the upper-left corner).
    pub fn pixel_to_geo_f(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Fractional pixel position of a map coordinate.
    ///
    /// Integer parts select the pixel; a pixel center sits at `n + 0.5`.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-15 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// Map extent covered by a `width` x `height` raster.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let corners = [
            self.pixel_to_geo_f(0.0, 0.0),
            self.pixel_to_geo_f(width as f64, 0.0),
            self.pixel_to_geo_f(0.0, height as f64),
            self.pixel_to_geo_f(width as f64, height as f64),
        ];
        BoundingBox::enclosing(corners).unwrap_or(BoundingBox::new(
            self.origin_x,
            self.origin_y,
            self.origin_x,
            self.origin_y,
        ))
    }

    /// Absolute pixel size `(x, y)`.
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    /// Coefficient-wise comparison within `eps`.
    pub fn approx_eq(&self, other: &GeoTransform, eps: f64) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Transform of the sub-grid starting at `window`'s upper-left pixel.
    pub fn for_window(&self, window: &Window) -> GeoTransform {
        let (x, y) = self.pixel_to_geo_f(window.col_off as f64, window.row_off as f64);
        GeoTransform {
            origin_x: x,
            origin_y: y,
            ..*self
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

/// A rectangular block of pixels. Offsets may be negative while a window is
/// being derived from map bounds; clip it with [`Window::intersect`] before
/// reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub col_off: i64,
    pub row_off: i64,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(col_off: i64, row_off: i64, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Window covering a whole `width` x `height` raster.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Smallest whole-pixel window of `transform`'s grid covering `bbox`.
    ///
    /// Offsets are floored and far edges ceiled, so the window always
    /// contains the requested area.
    pub fn from_bounds(bbox: &BoundingBox, transform: &GeoTransform) -> Self {
        let corners = [
            transform.geo_to_pixel(bbox.min_x, bbox.min_y),
            transform.geo_to_pixel(bbox.min_x, bbox.max_y),
            transform.geo_to_pixel(bbox.max_x, bbox.min_y),
            transform.geo_to_pixel(bbox.max_x, bbox.max_y),
        ];
        let Some(pixels) = BoundingBox::enclosing(corners) else {
            return Self::new(0, 0, 0, 0);
        };

        // Snap values that are a rounding error away from an integer.
        let snap = |v: f64| if (v - v.round()).abs() < 1e-6 { v.round() } else { v };
        let col0 = snap(pixels.min_x).floor();
        let row0 = snap(pixels.min_y).floor();
        let col1 = snap(pixels.max_x).ceil();
        let row1 = snap(pixels.max_y).ceil();

        Self::new(
            col0 as i64,
            row0 as i64,
            (col1 - col0).max(0.0) as usize,
            (row1 - row0).max(0.0) as usize,
        )
    }

    /// Map extent of this window.
    pub fn bounds(&self, transform: &GeoTransform) -> BoundingBox {
        transform
            .for_window(self)
            .bounds(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Overlap of two windows, `None` when they do not overlap.
    pub fn intersect(&self, other: &Window) -> Option<Window> {
        let col0 = self.col_off.max(other.col_off);
        let row0 = self.row_off.max(other.row_off);
        let col1 = (self.col_off + self.width as i64).min(other.col_off + other.width as i64);
        let row1 = (self.row_off + self.height as i64).min(other.row_off + other.height as i64);

        if col1 <= col0 || row1 <= row0 {
            return None;
        }
        Some(Window::new(
            col0,
            row0,
            (col1 - col0) as usize,
            (row1 - row0) as usize,
        ))
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Split a `width` x `height` raster into windows of at most `chunk` pixels
/// per side, in row-major order. Edge windows are truncated.
pub fn chunk_windows(width: usize, height: usize, chunk: usize) -> Vec<Window> {
    let chunk = chunk.max(1);
    let n_rows = height.div_ceil(chunk);
    let n_cols = width.div_ceil(chunk);

    let mut windows = Vec::with_capacity(n_rows * n_cols);
    for i in 0..n_rows {
        for j in 0..n_cols {
            let row_start = i * chunk;
            let col_start = j * chunk;
            let row_end = ((i + 1) * chunk).min(height);
            let col_end = ((j + 1) * chunk).min(width);
            windows.push(Window::new(
                col_start as i64,
                row_start as i64,
                col_end - col_start,
                row_end - row_start,
            ));
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm_transform() -> GeoTransform {
        GeoTransform::new(560000.0, 5763000.0, 10.0, -10.0)
    }

    #[test]
    fn test_pixel_geo_roundtrip() {
        let gt = utm_transform();
        let (x, y) = gt.pixel_to_geo(10, 20);
        assert_eq!((x, y), (560105.0, 5762795.0));

        let (col, row) = gt.geo_to_pixel(x, y);
        assert!((col - 10.5).abs() < 1e-9);
        assert!((row - 20.5).abs() < 1e-9);
    }

    #[test]
    fn test_bounds() {
        let bbox = utm_transform().bounds(100, 50);
        assert_eq!(bbox, BoundingBox::new(560000.0, 5762500.0, 561000.0, 5763000.0));
    }

    #[test]
    fn test_from_bounds_is_inverse_of_bounds() {
        let gt = utm_transform();
        let window = Window::new(20, 30, 15, 25);
        let bbox = window.bounds(&gt);
        assert_eq!(Window::from_bounds(&bbox, &gt), window);
    }

    #[test]
    fn test_from_bounds_covers_partial_pixels() {
        let gt = utm_transform();
        let bbox = BoundingBox::new(560005.0, 5762985.0, 560021.0, 5762999.0);
        let window = Window::from_bounds(&bbox, &gt);
        assert_eq!(window, Window::new(0, 0, 3, 2));
    }

    #[test]
    fn test_intersect() {
        let full = Window::full(100, 100);
        let w = Window::new(-10, 90, 30, 30);
        assert_eq!(w.intersect(&full), Some(Window::new(0, 90, 20, 10)));
        assert_eq!(Window::new(200, 0, 5, 5).intersect(&full), None);
    }

    #[test]
    fn test_chunk_windows() {
        let windows = chunk_windows(5000, 4100, 2000);
        assert_eq!(windows.len(), 9);
        assert_eq!(windows[0], Window::new(0, 0, 2000, 2000));
        assert_eq!(windows[2], Window::new(4000, 0, 1000, 2000));
        assert_eq!(windows[8], Window::new(4000, 4000, 1000, 100));

        let covered: usize = windows.iter().map(Window::pixel_count).sum();
        assert_eq!(covered, 5000 * 4100);
    }

    #[test]
    fn test_chunk_windows_empty_raster() {
        assert!(chunk_windows(0, 10, 2000).is_empty());
    }
}
