//! Point and bounding-box transformations between supported CRSs.

use crate::{TransverseMercator, WebMercator};
use agro_common::{BoundingBox, CrsCode};

/// Points sampled along each bbox edge when transforming bounds.
pub const DEFAULT_DENSIFY_POINTS: usize = 21;

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Transformation from {from} to {to} produced a non-finite coordinate for ({x}, {y})")]
    NonFinite {
        from: CrsCode,
        to: CrsCode,
        x: f64,
        y: f64,
    },

    #[error("Invalid bounds for transformation: {0}")]
    InvalidBounds(String),
}

/// Projection math for a CRS.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Longitude/latitude in degrees, no projection
    Geographic,
    WebMercator(WebMercator),
    TransverseMercator(TransverseMercator),
}

impl Projection {
    pub fn for_crs(crs: CrsCode) -> Self {
        match crs {
            CrsCode::Epsg4326 => Projection::Geographic,
            CrsCode::Epsg3857 => Projection::WebMercator(WebMercator),
            CrsCode::Utm { zone, south } => {
                Projection::TransverseMercator(TransverseMercator::utm(zone, south))
            }
            // POSGAR 94 and POSGAR 2007 agree with WGS84 well below the
            // resolution of the rasters, so both share the same projection.
            CrsCode::GaussKruger { zone } | CrsCode::GaussKruger94 { zone } => {
                Projection::TransverseMercator(TransverseMercator::gauss_kruger_argentina(zone))
            }
        }
    }

    /// Longitude/latitude (degrees) to projected coordinates.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator(p) => p.forward(lon, lat),
            Projection::TransverseMercator(p) => p.forward(lon, lat),
        }
    }

    /// Projected coordinates to longitude/latitude (degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator(p) => p.inverse(x, y),
            Projection::TransverseMercator(p) => p.inverse(x, y),
        }
    }
}

/// Reusable transformer between two CRSs.
#[derive(Debug, Clone)]
pub struct Transformer {
    from_crs: CrsCode,
    to_crs: CrsCode,
    from: Projection,
    to: Projection,
}

impl Transformer {
    pub fn new(from_crs: CrsCode, to_crs: CrsCode) -> Self {
        Self {
            from_crs,
            to_crs,
            from: Projection::for_crs(from_crs),
            to: Projection::for_crs(to_crs),
        }
    }

    /// True when both CRSs are the same and points pass through unchanged.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transform a point; NaN or infinite results come back as NaN.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.from.inverse(x, y);
        self.to.forward(lon, lat)
    }

    pub fn try_apply(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let (tx, ty) = self.apply(x, y);
        if tx.is_finite() && ty.is_finite() {
            Ok((tx, ty))
        } else {
            Err(ProjectionError::NonFinite {
                from: self.from_crs,
                to: self.to_crs,
                x,
                y,
            })
        }
    }
}

/// Transform a single point from one CRS to another.
pub fn transform_point(
    from: CrsCode,
    to: CrsCode,
    x: f64,
    y: f64,
) -> Result<(f64, f64), ProjectionError> {
    Transformer::new(from, to).try_apply(x, y)
}

/// Transform a bounding box, sampling `densify` points along every edge so
/// curved edges in the target CRS are enclosed.
pub fn transform_bounds(
    from: CrsCode,
    to: CrsCode,
    bbox: &BoundingBox,
    densify: usize,
) -> Result<BoundingBox, ProjectionError> {
    if !bbox.is_valid() {
        return Err(ProjectionError::InvalidBounds(bbox.to_string()));
    }

    let transformer = Transformer::new(from, to);
    if transformer.is_identity() {
        return Ok(*bbox);
    }

    let steps = densify.max(2) - 1;
    let mut points = Vec::with_capacity(4 * (steps + 1));
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = bbox.min_x + t * bbox.width();
        let y = bbox.min_y + t * bbox.height();
        points.push((x, bbox.min_y));
        points.push((x, bbox.max_y));
        points.push((bbox.min_x, y));
        points.push((bbox.max_x, y));
    }

    let projected = points
        .into_iter()
        .map(|(x, y)| transformer.try_apply(x, y))
        .collect::<Result<Vec<_>, _>>()?;

    BoundingBox::enclosing(projected)
        .ok_or_else(|| ProjectionError::InvalidBounds(bbox.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTM_21S: CrsCode = CrsCode::Utm {
        zone: 21,
        south: true,
    };

    #[test]
    fn test_identity() {
        let (x, y) = transform_point(UTM_21S, UTM_21S, 1.5, 2.5).unwrap();
        assert_eq!((x, y), (1.5, 2.5));
    }

    #[test]
    fn test_geographic_to_utm_and_back() {
        let (x, y) = transform_point(CrsCode::Epsg4326, UTM_21S, -60.2793, -38.3731).unwrap();
        let (lon, lat) = transform_point(UTM_21S, CrsCode::Epsg4326, x, y).unwrap();
        assert!((lon + 60.2793).abs() < 1e-7);
        assert!((lat + 38.3731).abs() < 1e-7);
    }

    #[test]
    fn test_utm_to_gauss_kruger() {
        let gk = CrsCode::GaussKruger { zone: 5 };
        let (x, y) = transform_point(UTM_21S, gk, 213_514.83, 5_747_694.90).unwrap();
        // Tres Arroyos sits a little west of the zone 5 meridian (60°W)
        assert!(x > 5_470_000.0 && x < 5_500_000.0, "x = {}", x);
        assert!(y > 5_700_000.0 && y < 5_850_000.0, "y = {}", y);
    }

    #[test]
    fn test_transform_bounds_encloses_corners() {
        let bbox = BoundingBox::around(213_514.83, 5_747_694.90, 14_000.0);
        let geo = transform_bounds(UTM_21S, CrsCode::Epsg4326, &bbox, DEFAULT_DENSIFY_POINTS)
            .unwrap();
        assert!(geo.contains_point(-60.2793, -38.3731));
        assert!(geo.width() > 0.3 && geo.width() < 0.4);
        assert!(geo.height() > 0.24 && geo.height() < 0.27);
    }

    #[test]
    fn test_transform_bounds_rejects_degenerate() {
        let bbox = BoundingBox::new(1.0, 1.0, 1.0, 2.0);
        assert!(transform_bounds(UTM_21S, CrsCode::Epsg4326, &bbox, 21).is_err());
    }
}
