//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRS codes used by the Sentinel-2 products and the national crop maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// WGS84 / UTM (EPSG:326zz north, EPSG:327zz south)
    Utm { zone: u8, south: bool },
    /// POSGAR 2007 / Argentina Gauss-Krüger, zones 1 to 7 (EPSG:5343-5349)
    GaussKruger { zone: u8 },
    /// POSGAR 94 / Argentina Gauss-Krüger, zones 1 to 7 (EPSG:22181-22187)
    GaussKruger94 { zone: u8 },
}

impl CrsCode {
    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:32721"
    /// - "epsg:4326"
    /// - "CRS:84" (equivalent to EPSG:4326)
    /// - "32721" (bare EPSG code)
    pub fn from_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(CrsCode::Epsg4326);
        }

        let code = normalized
            .strip_prefix("EPSG:")
            .unwrap_or(&normalized)
            .parse::<u32>()
            .map_err(|_| CrsParseError::UnsupportedCrs(s.to_string()))?;

        Self::from_epsg(code).ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))
    }

    /// Map a numeric EPSG code to a supported CRS.
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(CrsCode::Epsg4326),
            3857 | 900913 => Some(CrsCode::Epsg3857),
            32601..=32660 => Some(CrsCode::Utm {
                zone: (code - 32600) as u8,
                south: false,
            }),
            32701..=32760 => Some(CrsCode::Utm {
                zone: (code - 32700) as u8,
                south: true,
            }),
            5343..=5349 => Some(CrsCode::GaussKruger {
                zone: (code - 5342) as u8,
            }),
            22181..=22187 => Some(CrsCode::GaussKruger94 {
                zone: (code - 22180) as u8,
            }),
            _ => None,
        }
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match *self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Utm { zone, south: false } => 32600 + zone as u32,
            CrsCode::Utm { zone, south: true } => 32700 + zone as u32,
            CrsCode::GaussKruger { zone } => 5342 + zone as u32,
            CrsCode::GaussKruger94 { zone } => 22180 + zone as u32,
        }
    }

    /// UTM zone containing a WGS84 position.
    pub fn utm_for_lon_lat(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32).clamp(0, 59) + 1;
        CrsCode::Utm {
            zone: zone as u8,
            south: lat < 0.0,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl std::str::FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(CrsCode::from_string("EPSG:4326").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::from_string("CRS:84").unwrap(), CrsCode::Epsg4326);
        assert_eq!(
            CrsCode::from_string("epsg:32721").unwrap(),
            CrsCode::Utm {
                zone: 21,
                south: true
            }
        );
        assert_eq!(
            CrsCode::from_string("5347").unwrap(),
            CrsCode::GaussKruger { zone: 5 }
        );
        assert_eq!(
            CrsCode::from_string("EPSG:22185").unwrap(),
            CrsCode::GaussKruger94 { zone: 5 }
        );
        assert!(CrsCode::from_string("EPSG:99999").is_err());
        assert!(CrsCode::from_string("not-a-crs").is_err());
    }

    #[test]
    fn test_epsg_roundtrip_display() {
        for code in [4326, 3857, 32621, 32721, 5343, 5349, 22181] {
            let crs = CrsCode::from_epsg(code).unwrap();
            assert_eq!(crs.epsg(), code);
            assert_eq!(crs.to_string(), format!("EPSG:{}", code));
        }
    }

    #[test]
    fn test_utm_for_tres_arroyos() {
        assert_eq!(
            CrsCode::utm_for_lon_lat(-60.2793, -38.3731),
            CrsCode::Utm {
                zone: 20,
                south: true
            }
        );
        assert_eq!(
            CrsCode::utm_for_lon_lat(-57.5, -38.0),
            CrsCode::Utm {
                zone: 21,
                south: true
            }
        );
    }
}
