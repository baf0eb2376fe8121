//! Spherical Web Mercator (EPSG:3857).

use crate::WGS84_A;
use std::f64::consts::PI;

/// Latitude limit where Web Mercator becomes square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WebMercator;

impl WebMercator {
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = WGS84_A * lon_deg.to_radians();
        let y = WGS84_A * (PI / 4.0 + lat / 2.0).tan().ln();
        (x, y)
    }

    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / WGS84_A).to_degrees();
        let lat = (2.0 * (y / WGS84_A).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_and_extent() {
        let (x, y) = WebMercator.forward(0.0, 0.0);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);

        let (x, _) = WebMercator.forward(180.0, 0.0);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
    }

    #[test]
    fn test_roundtrip() {
        let (x, y) = WebMercator.forward(-60.2793, -38.3731);
        let (lon, lat) = WebMercator.inverse(x, y);
        assert!((lon + 60.2793).abs() < 1e-9);
        assert!((lat + 38.3731).abs() < 1e-9);
    }
}
