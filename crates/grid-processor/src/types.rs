//! Core types for grid processing.

use crate::error::{GridProcessorError, Result};
use agro_common::{BoundingBox, CrsCode, GeoTransform};
use geotiff_io::{read_band, read_info, RasterBand, RasterInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Interpolation method for grid resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values, used for class rasters).
    Nearest,
    /// Bilinear interpolation (smooth, slight value changes).
    #[default]
    Bilinear,
    /// Bicubic interpolation (smoothest, more compute).
    Cubic,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest" => Self::Nearest,
            "cubic" | "bicubic" => Self::Cubic,
            _ => Self::Bilinear,
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Cubic => write!(f, "cubic"),
        }
    }
}

/// Growing season of a crop map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    /// Winter crops (2023 map)
    #[serde(rename = "invierno")]
    Winter,
    /// Summer crops (2024 map)
    #[serde(rename = "verano")]
    Summer,
}

impl Season {
    pub const ALL: [Season; 2] = [Season::Winter, Season::Summer];

    /// Name used for band names and output keys.
    pub fn label(&self) -> &'static str {
        match self {
            Season::Winter => "invierno",
            Season::Summer => "verano",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One band of a raster file together with its georeferencing.
#[derive(Debug, Clone)]
pub struct GridRaster {
    pub band: RasterBand,
    pub transform: GeoTransform,
    pub crs: Option<CrsCode>,
    pub nodata: Option<f64>,
    pub path: PathBuf,
}

impl GridRaster {
    /// Read 1-based `band` of the file at `path`.
    pub fn open(path: impl AsRef<Path>, band: usize) -> Result<Self> {
        let path = path.as_ref();
        let info = read_info(path)?;
        Self::open_with_info(&info, band)
    }

    /// Read the NDVI band of a file: the first band whose description
    /// mentions NDVI, else band 1.
    pub fn open_ndvi(path: impl AsRef<Path>) -> Result<Self> {
        let info = read_info(path.as_ref())?;
        let band = info.find_band("NDVI");
        Self::open_with_info(&info, band)
    }

    fn open_with_info(info: &RasterInfo, band: usize) -> Result<Self> {
        let data = read_band(&info.path, band)?;
        debug!(
            path = %info.path.display(),
            band = band,
            width = data.width,
            height = data.height,
            crs = %info.crs_string(),
            "Opened raster band"
        );
        Ok(Self {
            band: data,
            transform: info.transform,
            crs: info.crs,
            nodata: info.nodata,
            path: info.path.clone(),
        })
    }

    /// Wrap an in-memory band.
    pub fn from_band(band: RasterBand, transform: GeoTransform, crs: CrsCode, nodata: Option<f64>) -> Self {
        Self {
            band,
            transform,
            crs: Some(crs),
            nodata,
            path: PathBuf::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.band.width
    }

    pub fn height(&self) -> usize {
        self.band.height
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width(), self.height())
    }

    /// CRS, or an error naming the file when it has none.
    pub fn require_crs(&self) -> Result<CrsCode> {
        self.crs
            .ok_or_else(|| GridProcessorError::MissingCrs(self.path.display().to_string()))
    }

    /// True when `other` has the same CRS, size and transform.
    pub fn same_grid(&self, transform: &GeoTransform, crs: Option<CrsCode>, width: usize, height: usize) -> bool {
        self.crs == crs
            && self.width() == width
            && self.height() == height
            && self.transform.approx_eq(transform, 1e-9)
    }

    /// Replace nodata samples with NaN and forget the nodata value.
    pub fn mask_nodata(&mut self) {
        self.band.mask_nodata(self.nodata);
        self.nodata = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_method_from_str() {
        assert_eq!(
            InterpolationMethod::from_str("nearest"),
            InterpolationMethod::Nearest
        );
        assert_eq!(
            InterpolationMethod::from_str("BILINEAR"),
            InterpolationMethod::Bilinear
        );
        assert_eq!(
            InterpolationMethod::from_str("bicubic"),
            InterpolationMethod::Cubic
        );
        assert_eq!(
            InterpolationMethod::from_str("unknown"),
            InterpolationMethod::Bilinear
        );
    }

    #[test]
    fn test_season_labels() {
        assert_eq!(Season::Winter.label(), "invierno");
        assert_eq!(Season::Summer.to_string(), "verano");
        assert_eq!(serde_json::to_string(&Season::Winter).unwrap(), "\"invierno\"");
    }

    #[test]
    fn test_mask_nodata() {
        let band = RasterBand::new(vec![0.5, -9999.0], 2, 1);
        let mut raster = GridRaster::from_band(
            band,
            GeoTransform::default(),
            CrsCode::Epsg4326,
            Some(-9999.0),
        );
        raster.mask_nodata();
        assert!(raster.band.data[1].is_nan());
        assert_eq!(raster.nodata, None);
    }

    #[test]
    fn test_same_grid() {
        let raster = GridRaster::from_band(
            RasterBand::filled(3, 2, 0.0),
            GeoTransform::default(),
            CrsCode::Epsg4326,
            None,
        );
        assert!(raster.same_grid(&GeoTransform::default(), Some(CrsCode::Epsg4326), 3, 2));
        assert!(!raster.same_grid(&GeoTransform::default(), Some(CrsCode::Epsg3857), 3, 2));
        assert!(!raster.same_grid(&GeoTransform::default(), Some(CrsCode::Epsg4326), 2, 2));
    }
}
