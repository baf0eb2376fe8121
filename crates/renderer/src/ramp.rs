//! Continuous colour ramps for NDVI previews.

use agro_common::Color;
use geotiff_io::RasterBand;
use image::RgbaImage;
use rayon::prelude::*;

/// Ordered colour stops; values between stops are interpolated linearly and
/// values outside the range take the end colours.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<(f32, Color)>,
}

impl ColorRamp {
    /// Stops are sorted by value. Returns `None` without stops.
    pub fn new(mut stops: Vec<(f32, Color)>) -> Option<Self> {
        if stops.is_empty() || stops.iter().any(|(v, _)| !v.is_finite()) {
            return None;
        }
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(Self { stops })
    }

    /// Bare soil brown through yellow to dense vegetation green over -0.2..0.9.
    pub fn ndvi() -> Self {
        Self {
            stops: vec![
                (-0.2, Color::rgb(120, 80, 40)),
                (0.1, Color::rgb(200, 170, 110)),
                (0.3, Color::rgb(240, 230, 90)),
                (0.5, Color::rgb(140, 200, 60)),
                (0.7, Color::rgb(40, 150, 40)),
                (0.9, Color::rgb(0, 90, 20)),
            ],
        }
    }

    pub fn stops(&self) -> &[(f32, Color)] {
        &self.stops
    }

    /// Colour for `value`; NaN is transparent.
    pub fn color_at(&self, value: f32) -> Color {
        if value.is_nan() {
            return Color::transparent();
        }
        let (first, last) = (self.stops[0], self.stops[self.stops.len() - 1]);
        if value <= first.0 {
            return first.1;
        }
        if value >= last.0 {
            return last.1;
        }
        for pair in self.stops.windows(2) {
            let ((v0, c0), (v1, c1)) = (pair[0], pair[1]);
            if value <= v1 {
                let t = if v1 > v0 { (value - v0) / (v1 - v0) } else { 1.0 };
                return lerp(c0, c1, t);
            }
        }
        last.1
    }
}

fn lerp(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color::rgba(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), mix(a.a, b.a))
}

/// Colour every pixel of `band` with `ramp`.
pub fn render_ramp(band: &RasterBand, ramp: &ColorRamp) -> RgbaImage {
    let mut pixels = vec![0u8; band.width * band.height * 4];
    pixels
        .par_chunks_mut(4)
        .zip(band.data.par_iter())
        .for_each(|(px, value)| {
            let (r, g, b, a) = ramp.color_at(*value).to_rgba();
            px.copy_from_slice(&[r, g, b, a]);
        });
    RgbaImage::from_raw(band.width as u32, band.height as u32, pixels)
        .unwrap_or_else(|| RgbaImage::new(band.width as u32, band.height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_at_interpolates() {
        let ramp = ColorRamp::new(vec![
            (1.0, Color::rgb(100, 100, 100)),
            (0.0, Color::rgb(0, 0, 0)),
        ])
        .unwrap();
        assert_eq!(ramp.color_at(0.5), Color::rgb(50, 50, 50));
        assert_eq!(ramp.color_at(-3.0), Color::rgb(0, 0, 0));
        assert_eq!(ramp.color_at(7.0), Color::rgb(100, 100, 100));
        assert!(ramp.color_at(f32::NAN).is_transparent());
    }

    #[test]
    fn test_empty_ramp() {
        assert!(ColorRamp::new(vec![]).is_none());
    }

    #[test]
    fn test_render_ramp() {
        let band = RasterBand::new(vec![0.9, f32::NAN], 2, 1);
        let img = render_ramp(&band, &ColorRamp::ndvi());
        assert_eq!(img.get_pixel(0, 0).0, [0, 90, 20, 255]);
        assert_eq!(img.get_pixel(1, 0).0[3], 0);
    }
}
