//! Consistency check of the monthly NDVI rasters before stacking.

use crate::compare::{format_nodata, RasterProperties};
use crate::error::{GridProcessorError, Result};
use agro_common::GeoTransform;
use geotiff_io::read_info;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Properties of one monthly raster, with the band holding NDVI.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRaster {
    pub properties: RasterProperties,
    /// 1-based band used for NDVI
    pub band: usize,
}

/// Min and max of one bound edge across files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Range {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |r, v| Range {
                min: r.min.min(v),
                max: r.max.max(v),
            },
        )
    }
}

/// Spread of the bounds across files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundsRange {
    pub left: Range,
    pub bottom: Range,
    pub right: Range,
    pub top: Range,
}

/// Work needed before the rasters can be stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequiredAction {
    /// CRS differ
    Reproject,
    /// Sizes differ
    ClipOrReproject,
    /// Transforms differ
    Realign,
}

impl RequiredAction {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Reproject => "different CRS: reprojection required",
            Self::ClipOrReproject => "different dimensions: clipping or reprojection required",
            Self::Realign => "different transforms: reprojection required",
        }
    }
}

/// Result of [`verify_consistency`].
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub rasters: Vec<MonthlyRaster>,
    /// Files that could not be read, with the reason
    pub errors: Vec<(PathBuf, String)>,
    pub unique_crs: usize,
    pub unique_width: usize,
    pub unique_height: usize,
    pub unique_nodata: usize,
    pub unique_dtype: usize,
    pub unique_transforms: usize,
    pub unique_bounds: usize,
    pub bounds_range: BoundsRange,
}

impl ConsistencyReport {
    /// CRS, size and transform are shared by every readable file.
    pub fn all_consistent(&self) -> bool {
        self.unique_crs == 1
            && self.unique_width == 1
            && self.unique_height == 1
            && self.unique_transforms == 1
    }

    pub fn required_actions(&self) -> Vec<RequiredAction> {
        let mut actions = Vec::new();
        if self.unique_crs > 1 {
            actions.push(RequiredAction::Reproject);
        }
        if self.unique_width > 1 || self.unique_height > 1 {
            actions.push(RequiredAction::ClipOrReproject);
        }
        if self.unique_transforms > 1 {
            actions.push(RequiredAction::Realign);
        }
        actions
    }

    /// Write `archivo,crs,width,height,nodata,dtype,res_width,res_height`
    /// rows, one per readable file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = String::from("archivo,crs,width,height,nodata,dtype,res_width,res_height\n");
        for r in &self.rasters {
            let p = &r.properties;
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{}",
                p.file,
                p.crs,
                p.width,
                p.height,
                format_nodata(p.nodata),
                p.dtype,
                p.res_width,
                p.res_height
            );
        }
        std::fs::write(path, out)?;
        Ok(())
    }
}

fn count_unique<T: PartialEq>(values: impl Iterator<Item = T>) -> usize {
    let mut seen: Vec<T> = Vec::new();
    for v in values {
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    seen.len()
}

/// Collect the properties of every file and count how many distinct values
/// each one takes.
///
/// Unreadable files are reported in `errors`; at least one file must be
/// readable. Multi-band files use the band whose description names NDVI.
pub fn verify_consistency(files: &[PathBuf]) -> Result<ConsistencyReport> {
    let mut rasters = Vec::new();
    let mut errors = Vec::new();

    for path in files {
        match read_info(path) {
            Ok(info) => {
                let band = if info.count > 1 { info.find_band("NDVI") } else { 1 };
                let properties = RasterProperties::from(&info);
                info!(
                    file = %properties.file,
                    crs = %properties.crs,
                    width = properties.width,
                    height = properties.height,
                    band = band,
                    "Read raster properties"
                );
                rasters.push(MonthlyRaster { properties, band });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read raster properties");
                errors.push((path.clone(), e.to_string()));
            }
        }
    }

    if rasters.is_empty() {
        return Err(GridProcessorError::NoInputs(
            "no raster properties could be read".to_string(),
        ));
    }

    let props = || rasters.iter().map(|r| &r.properties);
    // Nodata compares by bit pattern so NaN counts once.
    let nodata_key = |n: Option<f64>| n.map(|v| if v.is_nan() { u64::MAX } else { v.to_bits() });
    let transform_key = |t: &GeoTransform| t.to_gdal().map(f64::to_bits);

    let report = ConsistencyReport {
        unique_crs: count_unique(props().map(|p| p.crs.as_str())),
        unique_width: count_unique(props().map(|p| p.width)),
        unique_height: count_unique(props().map(|p| p.height)),
        unique_nodata: count_unique(props().map(|p| nodata_key(p.nodata))),
        unique_dtype: count_unique(props().map(|p| p.dtype.as_str())),
        unique_transforms: count_unique(props().map(|p| transform_key(&p.transform))),
        unique_bounds: count_unique(props().map(|p| {
            [p.bounds.min_x, p.bounds.min_y, p.bounds.max_x, p.bounds.max_y].map(f64::to_bits)
        })),
        bounds_range: BoundsRange {
            left: Range::of(props().map(|p| p.bounds.min_x)),
            bottom: Range::of(props().map(|p| p.bounds.min_y)),
            right: Range::of(props().map(|p| p.bounds.max_x)),
            top: Range::of(props().map(|p| p.bounds.max_y)),
        },
        rasters,
        errors,
    };

    if report.all_consistent() {
        info!(files = report.rasters.len(), "All rasters share CRS, size and transform");
    } else {
        for action in report.required_actions() {
            warn!(action = action.description(), "Rasters are not consistent");
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agro_common::CrsCode;
    use geotiff_io::{GeoTiffWriter, RasterBand};

    const UTM_21S: CrsCode = CrsCode::Utm {
        zone: 21,
        south: true,
    };

    fn write(dir: &Path, name: &str, gt: GeoTransform, width: usize) -> PathBuf {
        let path = dir.join(name);
        let band = RasterBand::filled(width, 3, 0.5);
        GeoTiffWriter::new(gt, UTM_21S)
            .with_nodata(f64::NAN)
            .write(&path, &[("NDVI", &band)])
            .unwrap();
        path
    }

    #[test]
    fn test_consistent_files() {
        let dir = tempfile::tempdir().unwrap();
        let gt = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        let files = vec![
            write(dir.path(), "NDVI_2023-06.tif", gt, 4),
            write(dir.path(), "NDVI_2023-07.tif", gt, 4),
        ];

        let report = verify_consistency(&files).unwrap();
        assert!(report.all_consistent());
        assert!(report.required_actions().is_empty());
        assert_eq!(report.unique_nodata, 1);
        assert_eq!(report.unique_bounds, 1);
    }

    #[test]
    fn test_inconsistent_files_need_actions() {
        let dir = tempfile::tempdir().unwrap();
        let gt = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        let shifted = GeoTransform::new(200_010.0, 5_760_000.0, 10.0, -10.0);
        let files = vec![
            write(dir.path(), "NDVI_2023-06.tif", gt, 4),
            write(dir.path(), "NDVI_2023-07.tif", shifted, 5),
            dir.path().join("missing.tif"),
        ];

        let report = verify_consistency(&files).unwrap();
        assert!(!report.all_consistent());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.required_actions(),
            vec![RequiredAction::ClipOrReproject, RequiredAction::Realign]
        );
        assert_eq!(report.bounds_range.left.min, 200_000.0);
        assert_eq!(report.bounds_range.left.max, 200_010.0);
        assert_eq!(report.bounds_range.right.max, 200_060.0);

        let csv = dir.path().join("report.csv");
        report.write_csv(&csv).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().starts_with("NDVI_2023-06.tif,EPSG:32721,4,3,nan,float32,10,10"));
    }

    #[test]
    fn test_no_readable_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = verify_consistency(&[dir.path().join("nope.tif")]);
        assert!(matches!(result, Err(GridProcessorError::NoInputs(_))));
    }
}
