//! Property comparison between rasters that should share a grid.
//!
//! Used to check the clipped crop maps against each other and against the
//! combined NDVI stack before merging them.

use crate::error::Result;
use agro_common::{BoundingBox, GeoTransform};
use geotiff_io::{read_info, RasterInfo};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Tolerance for resolution comparison.
pub const RES_TOLERANCE: f64 = 1e-10;

/// Properties of one raster as compared and reported.
#[derive(Debug, Clone, Serialize)]
pub struct RasterProperties {
    pub file: String,
    pub path: PathBuf,
    pub crs: String,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
    pub dtype: String,
    pub count: usize,
    pub bounds: BoundingBox,
    pub res_width: f64,
    pub res_height: f64,
}

impl RasterProperties {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from(&read_info(path)?))
    }
}

impl From<&RasterInfo> for RasterProperties {
    fn from(info: &RasterInfo) -> Self {
        let (res_width, res_height) = info.res();
        Self {
            file: info.file_name(),
            path: info.path.clone(),
            crs: info.crs_string(),
            width: info.width,
            height: info.height,
            transform: info.transform,
            nodata: info.nodata,
            dtype: info.dtype.clone(),
            count: info.count,
            bounds: info.bounds(),
            res_width,
            res_height,
        }
    }
}

/// Nodata as printed in reports.
pub fn format_nodata(nodata: Option<f64>) -> String {
    match nodata {
        None => "None".to_string(),
        Some(v) if v.is_nan() => "nan".to_string(),
        Some(v) => v.to_string(),
    }
}

/// Nodata equality where NaN equals NaN and unset equals unset.
pub fn nodata_eq(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => (x.is_nan() && y.is_nan()) || x == y,
        _ => false,
    }
}

fn format_transform(t: &GeoTransform) -> String {
    format!(
        "| {}, {}, {}|\n| {}, {}, {}|",
        t.pixel_width, t.row_rotation, t.origin_x, t.col_rotation, t.pixel_height, t.origin_y
    )
}

fn format_bounds(b: &BoundingBox) -> String {
    format!(
        "BoundingBox(left={}, bottom={}, right={}, top={})",
        b.min_x, b.min_y, b.max_x, b.max_y
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

/// One compared parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterComparison {
    pub name: String,
    pub left: String,
    pub right: String,
    pub matches: bool,
}

impl ParameterComparison {
    fn new(name: &str, left: impl ToString, right: impl ToString, matches: bool) -> Self {
        Self {
            name: name.to_string(),
            left: left.to_string(),
            right: right.to_string(),
            matches,
        }
    }
}

/// Result of [`compare_properties`].
#[derive(Debug, Clone, Serialize)]
pub struct PropertyComparison {
    pub left: String,
    pub right: String,
    pub parameters: Vec<ParameterComparison>,
    pub transform_matches: bool,
    pub bounds_matches: bool,
}

impl PropertyComparison {
    /// Every parameter, the transform and the bounds match.
    pub fn all_match(&self) -> bool {
        self.transform_matches && self.bounds_matches && self.parameters.iter().all(|p| p.matches)
    }

    /// Parameters that differ.
    pub fn mismatches(&self) -> impl Iterator<Item = &ParameterComparison> {
        self.parameters.iter().filter(|p| !p.matches)
    }
}

/// Compare `right` against `left`.
///
/// Resolutions match within [`RES_TOLERANCE`]; nodata treats NaN as equal to
/// NaN. The band count is compared only when `include_count` is set, since
/// a single-band crop map never has the band count of an NDVI stack.
pub fn compare_properties(
    left: &RasterProperties,
    right: &RasterProperties,
    include_count: bool,
) -> PropertyComparison {
    let mut parameters = vec![
        ParameterComparison::new("CRS", &left.crs, &right.crs, left.crs == right.crs),
        ParameterComparison::new("Width", left.width, right.width, left.width == right.width),
        ParameterComparison::new("Height", left.height, right.height, left.height == right.height),
        ParameterComparison::new(
            "Resolution width",
            left.res_width,
            right.res_width,
            (left.res_width - right.res_width).abs() < RES_TOLERANCE,
        ),
        ParameterComparison::new(
            "Resolution height",
            left.res_height,
            right.res_height,
            (left.res_height - right.res_height).abs() < RES_TOLERANCE,
        ),
        ParameterComparison::new(
            "Nodata",
            format_nodata(left.nodata),
            format_nodata(right.nodata),
            nodata_eq(left.nodata, right.nodata),
        ),
        ParameterComparison::new("Dtype", &left.dtype, &right.dtype, left.dtype == right.dtype),
    ];
    if include_count {
        parameters.push(ParameterComparison::new(
            "Band count",
            left.count,
            right.count,
            left.count == right.count,
        ));
    }

    PropertyComparison {
        left: left.file.clone(),
        right: right.file.clone(),
        parameters,
        transform_matches: left.transform == right.transform,
        bounds_matches: left.bounds == right.bounds,
    }
}

/// Offsets between two transforms and two bounds, for diagnosing a
/// mismatch.
pub fn grid_differences(left: &RasterProperties, right: &RasterProperties) -> Vec<(String, f64)> {
    let (a, b) = (&left.transform, &right.transform);
    let (la, lb) = (&left.bounds, &right.bounds);
    [
        ("origin_x", a.origin_x - b.origin_x),
        ("origin_y", a.origin_y - b.origin_y),
        ("pixel_width", a.pixel_width - b.pixel_width),
        ("pixel_height", a.pixel_height - b.pixel_height),
        ("left", la.min_x - lb.min_x),
        ("bottom", la.min_y - lb.min_y),
        ("right", la.max_x - lb.max_x),
        ("top", la.max_y - lb.max_y),
    ]
    .into_iter()
    .filter(|(_, d)| *d != 0.0)
    .map(|(n, d)| (n.to_string(), d))
    .collect()
}

/// Write one CSV row per raster:
/// `archivo,crs,width,height,res_width,res_height,nodata,dtype,count`.
pub fn write_properties_csv(path: impl AsRef<Path>, rasters: &[RasterProperties]) -> Result<()> {
    let mut out = String::from("archivo,crs,width,height,res_width,res_height,nodata,dtype,count\n");
    for r in rasters {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            r.file,
            r.crs,
            r.width,
            r.height,
            r.res_width,
            r.res_height,
            format_nodata(r.nodata),
            r.dtype,
            r.count
        );
    }
    std::fs::write(path, out)?;
    Ok(())
}

/// A reference raster and the comparisons of other rasters against it.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub title: String,
    pub reference: RasterProperties,
    pub compared: Vec<(RasterProperties, PropertyComparison)>,
}

impl ComparisonReport {
    /// Compare each of `others` against `reference`.
    pub fn build(
        title: impl Into<String>,
        reference: RasterProperties,
        others: Vec<RasterProperties>,
        include_count: bool,
    ) -> Self {
        let compared = others
            .into_iter()
            .map(|other| {
                let cmp = compare_properties(&reference, &other, include_count);
                (other, cmp)
            })
            .collect();
        Self {
            title: title.into(),
            reference,
            compared,
        }
    }

    pub fn all_match(&self) -> bool {
        self.compared.iter().all(|(_, c)| c.all_match())
    }

    /// Rasters of the report, reference first.
    pub fn rasters(&self) -> Vec<RasterProperties> {
        std::iter::once(self.reference.clone())
            .chain(self.compared.iter().map(|(p, _)| p.clone()))
            .collect()
    }

    /// Plain text report: properties of each raster, the comparisons and a
    /// conclusion.
    pub fn to_text(&self) -> String {
        let rule = "-".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title.to_uppercase());
        let _ = writeln!(out, "{}\n", "=".repeat(80));

        let write_props = |out: &mut String, heading: String, p: &RasterProperties| {
            let _ = writeln!(out, "{}", heading);
            let _ = writeln!(out, "{}", rule);
            let _ = writeln!(out, "  crs: {}", p.crs);
            let _ = writeln!(out, "  width: {}", p.width);
            let _ = writeln!(out, "  height: {}", p.height);
            let _ = writeln!(out, "  res_width: {}", p.res_width);
            let _ = writeln!(out, "  res_height: {}", p.res_height);
            let _ = writeln!(out, "  nodata: {}", format_nodata(p.nodata));
            let _ = writeln!(out, "  dtype: {}", p.dtype);
            let _ = writeln!(out, "  count: {}", p.count);
            let _ = writeln!(out, "  transform: {}", format_transform(&p.transform));
            let _ = writeln!(out, "  bounds: {}\n", format_bounds(&p.bounds));
        };
        write_props(
            &mut out,
            format!("PROPERTIES OF {} (REFERENCE)", self.reference.file.to_uppercase()),
            &self.reference,
        );
        for (p, _) in &self.compared {
            write_props(&mut out, format!("PROPERTIES OF {}", p.file.to_uppercase()), p);
        }

        for (p, cmp) in &self.compared {
            let _ = writeln!(out, "COMPARISON: {}", p.file.to_uppercase());
            let _ = writeln!(out, "{}", rule);
            for param in &cmp.parameters {
                let _ = writeln!(
                    out,
                    "{}: {} vs {} -> {}",
                    param.name,
                    param.left,
                    param.right,
                    yes_no(param.matches)
                );
            }
            let _ = writeln!(out, "Transform matches: {}", yes_no(cmp.transform_matches));
            let _ = writeln!(out, "Bounds matches: {}", yes_no(cmp.bounds_matches));
            for (name, diff) in grid_differences(&self.reference, p) {
                let _ = writeln!(out, "  {} differs by {}", name, diff);
            }
            let _ = writeln!(out, "ALL MATCH: {}\n", yes_no(cmp.all_match()));
        }

        let _ = writeln!(out, "CONCLUSION");
        let _ = writeln!(out, "{}", rule);
        if self.all_match() {
            let _ = writeln!(out, "All parameters match the reference.");
        } else {
            let _ = writeln!(out, "Some rasters do NOT match the reference:");
            for (p, cmp) in self.compared.iter().filter(|(_, c)| !c.all_match()) {
                let _ = writeln!(out, "  - {} differs", p.file);
                for param in cmp.mismatches() {
                    let _ = writeln!(out, "      {}", param.name);
                }
            }
        }
        out
    }

    /// Write the text report to `path`.
    pub fn write_text(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(file: &str, width: usize, nodata: Option<f64>) -> RasterProperties {
        let transform = GeoTransform::new(200_000.0, 5_760_000.0, 10.0, -10.0);
        RasterProperties {
            file: file.to_string(),
            path: PathBuf::from(file),
            crs: "EPSG:32721".to_string(),
            width,
            height: 50,
            transform,
            nodata,
            dtype: "uint8".to_string(),
            count: 1,
            bounds: transform.bounds(width, 50),
            res_width: 10.0,
            res_height: 10.0,
        }
    }

    #[test]
    fn test_identical_rasters_match() {
        let a = props("a.tif", 100, Some(255.0));
        let cmp = compare_properties(&a, &a.clone(), true);
        assert!(cmp.all_match());
        assert_eq!(cmp.parameters.len(), 8);
    }

    #[test]
    fn test_nan_nodata_matches_nan() {
        assert!(nodata_eq(Some(f64::NAN), Some(f64::NAN)));
        assert!(nodata_eq(None, None));
        assert!(!nodata_eq(Some(0.0), None));
        assert!(!nodata_eq(Some(0.0), Some(f64::NAN)));
    }

    #[test]
    fn test_width_mismatch_breaks_bounds() {
        let a = props("a.tif", 100, None);
        let b = props("b.tif", 101, None);
        let cmp = compare_properties(&a, &b, false);
        assert!(!cmp.all_match());
        assert!(cmp.transform_matches);
        assert!(!cmp.bounds_matches);
        let names: Vec<_> = cmp.mismatches().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Width"]);
        assert_eq!(grid_differences(&a, &b), vec![("right".to_string(), -10.0)]);
    }

    #[test]
    fn test_band_count_only_when_requested() {
        let a = props("a.tif", 100, None);
        let mut b = props("b.tif", 100, None);
        b.count = 19;
        assert!(compare_properties(&a, &b, false).all_match());
        assert!(!compare_properties(&a, &b, true).all_match());
    }

    #[test]
    fn test_text_report_sections() {
        let report = ComparisonReport::build(
            "Comparison of clipped rasters",
            props("recorte_invierno_GTiff.tif", 100, Some(0.0)),
            vec![props("recorte_verano_GTiff.tif", 100, Some(255.0))],
            false,
        );
        let text = report.to_text();
        assert!(text.starts_with("COMPARISON OF CLIPPED RASTERS"));
        assert!(text.contains("PROPERTIES OF RECORTE_INVIERNO_GTIFF.TIF (REFERENCE)"));
        assert!(text.contains("Nodata: 0 vs 255 -> NO"));
        assert!(text.contains("Transform matches: YES"));
        assert!(text.contains("CONCLUSION"));
        assert!(!report.all_match());
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_properties_csv(&path, &[props("a.tif", 100, None), props("b.tif", 100, Some(f64::NAN))])
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "archivo,crs,width,height,res_width,res_height,nodata,dtype,count");
        assert_eq!(lines[1], "a.tif,EPSG:32721,100,50,10,10,None,uint8,1");
        assert_eq!(lines[2], "b.tif,EPSG:32721,100,50,10,10,nan,uint8,1");
    }
}
