//! Bounding box types and operations.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (UTM, Gauss-Krüger), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Square box of `half_size` around a center point.
    pub fn around(x: f64, y: f64, half_size: f64) -> Self {
        Self::new(x - half_size, y - half_size, x + half_size, y + half_size)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when both axes have a positive, finite extent.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Smallest box containing every given point. `None` for an empty iterator
    /// or when any point is not finite.
    pub fn enclosing(points: impl IntoIterator<Item = (f64, f64)>) -> Option<BoundingBox> {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bbox = BoundingBox::new(x0, y0, x0, y0);
        for (x, y) in iter {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        let finite = [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y]
            .iter()
            .all(|v| v.is_finite());
        finite.then_some(bbox)
    }
}

impl FromStr for BoundingBox {
    type Err = BboxParseError;

    /// Parse "minx,miny,maxx,maxy".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| BboxParseError::InvalidNumber(p.to_string()))
        };

        Ok(Self {
            min_x: parse(parts[0])?,
            min_y: parse(parts[1])?,
            max_x: parse(parts[2])?,
            max_y: parse(parts[3])?,
        })
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox: BoundingBox = "560000,5735000,588000,5763000".parse().unwrap();
        assert_eq!(bbox.min_x, 560000.0);
        assert_eq!(bbox.min_y, 5735000.0);
        assert_eq!(bbox.max_x, 588000.0);
        assert_eq!(bbox.max_y, 5763000.0);
    }

    #[test]
    fn test_around() {
        let bbox = BoundingBox::around(100.0, 200.0, 14000.0);
        assert_eq!(bbox.width(), 28000.0);
        assert_eq!(bbox.height(), 28000.0);
        assert!(bbox.contains_point(100.0, 200.0));
    }

    #[test]
    fn test_enclosing() {
        let bbox = BoundingBox::enclosing(vec![(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-2.0, -1.0, 4.0, 5.0));
        assert!(BoundingBox::enclosing(Vec::new()).is_none());
        assert!(BoundingBox::enclosing(vec![(f64::NAN, 0.0)]).is_none());
    }
}
