//! In-memory raster band.

use agro_common::Window;

/// A single band of `f32` samples in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBand {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl RasterBand {
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    /// Band of the given size filled with `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self::new(vec![value; width * height], width, height)
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.data[row * self.width + col])
    }

    pub fn set(&mut self, col: usize, row: usize, value: f32) {
        if col < self.width && row < self.height {
            self.data[row * self.width + col] = value;
        }
    }

    /// Copy of the pixels under `window`. Parts of the window outside the
    /// band are filled with `fill`.
    pub fn window(&self, window: &Window, fill: f32) -> RasterBand {
        let mut out = RasterBand::filled(window.width, window.height, fill);
        let full = Window::full(self.width, self.height);
        let Some(overlap) = window.intersect(&full) else {
            return out;
        };

        let dst_col = (overlap.col_off - window.col_off) as usize;
        let dst_row = (overlap.row_off - window.row_off) as usize;
        for r in 0..overlap.height {
            let src_start = (overlap.row_off as usize + r) * self.width + overlap.col_off as usize;
            let dst_start = (dst_row + r) * window.width + dst_col;
            out.data[dst_start..dst_start + overlap.width]
                .copy_from_slice(&self.data[src_start..src_start + overlap.width]);
        }
        out
    }

    /// Write `block` into this band with its upper-left pixel at `window`'s offset.
    /// Pixels falling outside the band are dropped.
    pub fn write_window(&mut self, window: &Window, block: &RasterBand) {
        let target = Window::new(window.col_off, window.row_off, block.width, block.height);
        let full = Window::full(self.width, self.height);
        let Some(overlap) = target.intersect(&full) else {
            return;
        };

        let src_col = (overlap.col_off - target.col_off) as usize;
        let src_row = (overlap.row_off - target.row_off) as usize;
        for r in 0..overlap.height {
            let src_start = (src_row + r) * block.width + src_col;
            let dst_start = (overlap.row_off as usize + r) * self.width + overlap.col_off as usize;
            self.data[dst_start..dst_start + overlap.width]
                .copy_from_slice(&block.data[src_start..src_start + overlap.width]);
        }
    }

    /// Replace `nodata` samples with NaN.
    pub fn mask_nodata(&mut self, nodata: Option<f64>) {
        let Some(nodata) = nodata else {
            return;
        };
        if nodata.is_nan() {
            return;
        }
        let nodata = nodata as f32;
        for v in self.data.iter_mut() {
            if *v == nodata {
                *v = f32::NAN;
            }
        }
    }

    /// Number of pixels that are neither NaN nor `nodata`.
    pub fn valid_count(&self, nodata: Option<f64>) -> usize {
        self.data
            .iter()
            .filter(|v| is_valid(**v, nodata))
            .count()
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }
}

/// A sample is valid when it is not NaN and differs from `nodata`.
pub fn is_valid(value: f32, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return false;
    }
    match nodata {
        Some(nd) if !nd.is_nan() => value != nd as f32,
        _ => true,
    }
}
