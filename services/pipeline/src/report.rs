//! Console tables for the pipeline steps.

use std::collections::BTreeMap;

use agro_common::LandCoverStyle;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Table};
use grid_processor::{
    compare::format_nodata, ComparisonReport, ConsistencyReport, PresenceReport, Season,
    SeasonSeries,
};

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);
    table
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

/// Classes of a land-cover style with their colours.
pub fn style_table(style: &LandCoverStyle) -> String {
    let mut t = table(vec!["Value", "Label", "Color", "Alpha", "No data"]);
    for entry in style.iter() {
        t.add_row(vec![
            Cell::new(entry.value),
            Cell::new(&entry.label),
            Cell::new(entry.color.to_hex()),
            Cell::new(entry.color.a),
            Cell::new(if entry.is_no_data() { "yes" } else { "" }),
        ]);
    }
    t.to_string()
}

/// Annual NDVI statistics per class of one season.
pub fn summary_table(series: &SeasonSeries) -> String {
    let mut t = table(vec!["Class", "Label", "Mean", "Min", "Max", "Months"]);
    for s in series.summarize() {
        t.add_row(vec![
            Cell::new(s.class),
            Cell::new(&s.label),
            Cell::new(opt(s.mean)),
            Cell::new(opt(s.min)),
            Cell::new(opt(s.max)),
            Cell::new(format!("{}/{}", s.valid_months, series.months.len())),
        ]);
    }
    t.to_string()
}

/// Properties of every monthly raster and the consistency verdict.
pub fn consistency_table(report: &ConsistencyReport) -> String {
    let mut t = table(vec!["File", "CRS", "Size", "Nodata", "Dtype", "Resolution"]);
    for raster in &report.rasters {
        let p = &raster.properties;
        t.add_row(vec![
            p.file.clone(),
            p.crs.clone(),
            format!("{} x {}", p.width, p.height),
            format_nodata(p.nodata),
            p.dtype.clone(),
            format!("{:.6} x {:.6}", p.res_width, p.res_height),
        ]);
    }

    let mut summary = table(vec!["Parameter", "Unique values"]);
    for (name, count) in [
        ("CRS", report.unique_crs),
        ("Width", report.unique_width),
        ("Height", report.unique_height),
        ("Nodata", report.unique_nodata),
        ("Dtype", report.unique_dtype),
        ("Transform", report.unique_transforms),
        ("Bounds", report.unique_bounds),
    ] {
        summary.add_row(vec![name.to_string(), count.to_string()]);
    }
    summary.add_row(vec![
        "Consistent".to_string(),
        yes_no(report.all_consistent()).to_string(),
    ]);

    format!("{}\n{}", t, summary)
}

/// One table per raster compared against the reference.
pub fn comparison_table(report: &ComparisonReport) -> String {
    let mut out = Vec::new();
    for (props, cmp) in &report.compared {
        let mut t = table(vec![
            "Parameter",
            format!("{} (reference)", report.reference.file).as_str(),
            props.file.as_str(),
            "Matches",
        ]);
        for p in &cmp.parameters {
            t.add_row(vec![p.name.clone(), p.left.clone(), p.right.clone(), yes_no(p.matches).to_string()]);
        }
        t.add_row(vec![
            "Transform".to_string(),
            String::new(),
            String::new(),
            yes_no(cmp.transform_matches).to_string(),
        ]);
        t.add_row(vec![
            "Bounds".to_string(),
            String::new(),
            String::new(),
            yes_no(cmp.bounds_matches).to_string(),
        ]);
        out.push(t.to_string());
    }
    out.join("\n")
}

/// Crop-class pixel counts on the combined NDVI grid.
pub fn presence_table(report: &PresenceReport) -> String {
    let mut t = table(vec!["Season", "Crop pixels", "Total pixels", "Share"]);
    for season in Season::ALL {
        t.add_row(vec![
            season.label().to_string(),
            report.pixels(season).to_string(),
            report.total_pixels().to_string(),
            format!("{:.2}%", report.percent(season)),
        ]);
    }
    t.to_string()
}

/// Numbered band list of an output raster.
pub fn bands_table(names: &[String]) -> String {
    let mut t = table(vec!["Band", "Name"]);
    for (i, name) in names.iter().enumerate() {
        t.add_row(vec![(i + 1).to_string(), name.clone()]);
    }
    t.to_string()
}

/// Pixel count per class value of a rendered crop map.
pub fn class_count_table(counts: &BTreeMap<i64, u64>, style: &LandCoverStyle) -> String {
    let total: u64 = counts.values().sum();
    let mut t = table(vec!["Value", "Label", "Pixels", "Share"]);
    for (value, count) in counts {
        let share = if total == 0 {
            0.0
        } else {
            100.0 * *count as f64 / total as f64
        };
        t.add_row(vec![
            value.to_string(),
            style.label_for(*value),
            count.to_string(),
            format!("{:.2}%", share),
        ]);
    }
    t.to_string()
}
