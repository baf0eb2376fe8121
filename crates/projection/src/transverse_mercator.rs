//! Transverse Mercator projection on the WGS84 ellipsoid.
//!
//! Used for the Sentinel-2 UTM tiles and for the Argentine Gauss-Krüger
//! zones (POSGAR). The series expansions follow Snyder, "Map Projections:
//! A Working Manual" (USGS PP 1395), pp. 61-64, accurate to well below a
//! millimetre within a few degrees of the central meridian.
//!
//! The projection parameters include:
//! - Central meridian (lon0)
//! - Latitude of origin (lat0)
//! - Scale factor on the central meridian (k0)
//! - False easting / false northing in meters

use crate::{WGS84_A, WGS84_F};

#[derive(Debug, Clone, PartialEq)]
pub struct TransverseMercator {
    /// Central meridian in radians
    pub lon0: f64,
    /// Latitude of origin in radians
    pub lat0: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    /// Semi-major axis (meters)
    a: f64,
    /// First eccentricity squared
    e2: f64,
    /// Second eccentricity squared
    ep2: f64,
    /// Meridian distance at lat0
    m0: f64,
}

impl TransverseMercator {
    /// Create a projection from parameters given in degrees.
    pub fn new(
        lon0_deg: f64,
        lat0_deg: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let a = WGS84_A;
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let lat0 = lat0_deg.to_radians();

        Self {
            lon0: lon0_deg.to_radians(),
            lat0,
            k0,
            false_easting,
            false_northing,
            a,
            e2,
            ep2,
            m0: meridian_distance(a, e2, lat0),
        }
    }

    /// WGS84 / UTM zone `zone` (1-60).
    pub fn utm(zone: u8, south: bool) -> Self {
        let lon0 = -183.0 + 6.0 * zone as f64;
        let false_northing = if south { 10_000_000.0 } else { 0.0 };
        Self::new(lon0, 0.0, 0.9996, 500_000.0, false_northing)
    }

    /// Argentina Gauss-Krüger zone `zone` (1-7).
    ///
    /// Zone 1 is centred on 72°W and each zone moves 3° east. The false
    /// easting carries the zone number in its millions digit.
    pub fn gauss_kruger_argentina(zone: u8) -> Self {
        let lon0 = -72.0 + 3.0 * (zone as f64 - 1.0);
        let false_easting = zone as f64 * 1_000_000.0 + 500_000.0;
        Self::new(lon0, -90.0, 1.0, false_easting, 0.0)
    }

    /// Project longitude/latitude (degrees) to easting/northing (meters).
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let phi = lat_deg.to_radians();
        let lam = normalize_angle(lon_deg.to_radians() - self.lon0);

        let sin_phi = phi.sin();
        let cos_phi = phi.cos();
        let tan_phi = phi.tan();

        let n = self.a / (1.0 - self.e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = self.ep2 * cos_phi * cos_phi;
        let a = lam * cos_phi;
        let m = meridian_distance(self.a, self.e2, phi);

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let x = self.k0
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * self.ep2) * a5 / 120.0);

        let y = self.k0
            * (m - self.m0
                + n * tan_phi
                    * (a2 / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * self.ep2) * a6
                            / 720.0));

        (x + self.false_easting, y + self.false_northing)
    }

    /// Unproject easting/northing (meters) to longitude/latitude (degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let x = x - self.false_easting;
        let y = y - self.false_northing;

        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let sqrt_1_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);

        let m = self.m0 + y / self.k0;
        let mu = m / (self.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        let tan_phi1 = phi1.tan();

        let c1 = self.ep2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let w = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = self.a / w.sqrt();
        let r1 = self.a * (1.0 - e2) / w.powf(1.5);
        let d = x / (n1 * self.k0);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        let phi = phi1
            - (n1 * tan_phi1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * self.ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * self.ep2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);

        let lam = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * self.ep2 + 24.0 * t1 * t1)
                    * d5
                    / 120.0)
                / cos_phi1;

        (normalize_angle(lam).to_degrees(), phi.to_degrees())
    }
}

/// Distance along the meridian from the equator to latitude `phi` (radians).
fn meridian_distance(a: f64, e2: f64, phi: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Wrap an angle to [-PI, PI).
fn normalize_angle(rad: f64) -> f64 {
    use std::f64::consts::PI;
    (rad + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian_at_equator() {
        let utm = TransverseMercator::utm(21, true);
        let (x, y) = utm.forward(-57.0, 0.0);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!((y - 10_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_utm_roundtrip_tres_arroyos() {
        let utm = TransverseMercator::utm(21, true);
        let (x, y) = utm.forward(-60.2793, -38.3731);
        // West of the zone's central meridian, south hemisphere
        assert!(x < 500_000.0 && x > 150_000.0);
        assert!(y > 5_000_000.0 && y < 6_000_000.0);

        let (lon, lat) = utm.inverse(x, y);
        assert!((lon - (-60.2793)).abs() < 1e-7, "lon = {}", lon);
        assert!((lat - (-38.3731)).abs() < 1e-7, "lat = {}", lat);
    }

    #[test]
    fn test_utm_known_point() {
        // 45°N 9°E in UTM 32N is a standard reference: E 500000, N ~4982950.4
        let utm = TransverseMercator::utm(32, false);
        let (x, y) = utm.forward(9.0, 45.0);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!((y - 4_982_950.4).abs() < 1.0, "y = {}", y);
    }

    #[test]
    fn test_gauss_kruger_zone5() {
        let gk = TransverseMercator::gauss_kruger_argentina(5);
        let (x, y) = gk.forward(-60.0, -38.0);
        assert!((x - 5_500_000.0).abs() < 1e-6);
        // Northing measured from the south pole
        assert!(y > 5_700_000.0 && y < 5_850_000.0, "y = {}", y);

        let (lon, lat) = gk.inverse(x + 12_345.0, y - 6_789.0);
        let (x2, y2) = gk.forward(lon, lat);
        assert!((x2 - (x + 12_345.0)).abs() < 1e-3);
        assert!((y2 - (y - 6_789.0)).abs() < 1e-3);
    }
}
