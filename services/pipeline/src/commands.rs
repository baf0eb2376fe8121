//! The processing steps behind each `agro` subcommand.
//!
//! Every step reads its inputs from the paths in [`PipelineConfig`], writes
//! its numbered outputs into `proc_dir` and returns the report the CLI
//! prints.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agro_common::{Color, LandCoverStyle};
use anyhow::{Context, Result};
use geotiff_io::{read_info, GeoTiffWriter, PixelType};
use grid_processor::{
    class_presence, combine_ndvi, merge_clipped, ndvi_from_scene, season_series,
    verify_consistency, warp_to_grid, write_properties_csv, CombineReport, ComparisonReport,
    ConsistencyReport, GridRaster, InterpolationMethod, MergeReport, NdviByClass, PresenceReport,
    Progress, RasterProperties, Season, SeasonSeries,
};
use renderer::{class_counts, render_classes, render_ramp, save_png, ChartOptions, ColorRamp, Panel, Series};
use tracing::{info, warn};

use crate::config::PipelineConfig;

pub const NDVI_BY_CLASS_JSON: &str = "2_ndvi_por_categoria.json";
pub const CONSISTENCY_CSV: &str = "4_reporte_verificacion_ndvi.csv";
pub const COMBINED_TIF: &str = "5_NDVI_combinado.tif";
pub const COMBINED_NAMES: &str = "5_nombres_bandas_ndvi.txt";
pub const PRESENCE_TIF: &str = "6_NDVI_con_mnc.tif";
pub const PRESENCE_NAMES: &str = "6_nombres_bandas_ndvi_mnc.txt";
pub const CLIP_COMPARISON_CSV: &str = "7_reporte_comparacion_recortes.csv";
pub const CLIP_COMPARISON_TXT: &str = "7_reporte_comparacion_recortes_detallado.txt";
pub const REFERENCE_CHECK_CSV: &str = "8_reporte_verificacion_con_ndvi.csv";
pub const REFERENCE_CHECK_TXT: &str = "8_reporte_verificacion_con_ndvi_detallado.txt";
pub const MERGED_TIF: &str = "9_NDVI_con_recortes.tif";
pub const MERGED_NAMES: &str = "9_nombres_bandas_ndvi_recortes.txt";

/// Nodata of the clipped crop maps.
const CLASS_NODATA: f64 = 255.0;

pub fn load_style(config: &PipelineConfig, season: Season) -> Result<LandCoverStyle> {
    let path = config.style(season);
    LandCoverStyle::from_file(&path)
        .with_context(|| format!("Failed to load {} style: {}", season, path.display()))
}

/// Monthly NDVI mean per crop class for both seasons, saved as JSON.
pub fn zonal(config: &PipelineConfig, progress: &dyn Progress) -> Result<NdviByClass> {
    let files = config.ndvi_files()?;
    if files.is_empty() {
        anyhow::bail!("No NDVI_*.tif files in {}", config.ndvi_dir.display());
    }
    info!(files = files.len(), dir = %config.ndvi_dir.display(), "Found monthly NDVI rasters");

    let mut seasons = Vec::with_capacity(2);
    for season in Season::ALL {
        let style = load_style(config, season)?;
        let classes = config.mnc(season);
        let series = season_series(season, &classes, &files, &style, &config.grid, progress)
            .with_context(|| format!("Failed to compute {} series", season))?;
        seasons.push(series);
    }
    let verano = seasons.pop().context("missing summer series")?;
    let invierno = seasons.pop().context("missing winter series")?;
    let result = NdviByClass { invierno, verano };

    let output = config.proc(NDVI_BY_CLASS_JSON);
    result
        .save(&output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    info!(path = %output.display(), "Saved NDVI by class");
    Ok(result)
}

pub fn chart_title(season: Season) -> &'static str {
    match season {
        Season::Winter => "Evolución temporal NDVI por categoría - INVIERNO 2023",
        Season::Summer => "Evolución temporal NDVI por categoría - VERANO 2024",
    }
}

/// Chart panel of one season. Classes without any value are left out.
pub fn season_panel(series: &SeasonSeries, title: &str) -> Panel {
    let lines = series
        .classes
        .iter()
        .enumerate()
        .map(|(i, class)| Series {
            label: series
                .labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| class.to_string()),
            color: series
                .colors
                .get(i)
                .and_then(|hex| Color::from_hex(hex))
                .unwrap_or(Color::FALLBACK),
            values: series.class_values(*class).to_vec(),
        })
        .filter(Series::has_values)
        .collect();

    Panel {
        title: title.to_string(),
        months: series.months.clone(),
        series: lines,
    }
}

pub fn chart_panels(data: &NdviByClass) -> Vec<Panel> {
    Season::ALL
        .iter()
        .map(|season| season_panel(data.season(*season), chart_title(*season)))
        .collect()
}

/// Draw the two-panel chart from the saved JSON.
pub fn chart(config: &PipelineConfig) -> Result<PathBuf> {
    let input = config.proc(NDVI_BY_CLASS_JSON);
    let data = NdviByClass::load(&input).with_context(|| {
        format!(
            "Failed to read {} (run `agro zonal` first)",
            input.display()
        )
    })?;

    let panels = chart_panels(&data);
    for panel in &panels {
        if panel.series.is_empty() {
            warn!(title = %panel.title, "No class has NDVI values; panel left empty");
        }
    }

    let mut options = ChartOptions::new(config.chart.width, config.chart.height);
    if let Some(font) = &config.chart.font {
        options = options
            .with_font_file(font)
            .with_context(|| format!("Failed to load font: {}", font.display()))?;
    }
    let image = options.render(&panels);

    let output = config.chart_path();
    save_png(&image, &output).with_context(|| format!("Failed to save {}", output.display()))?;
    info!(path = %output.display(), "Saved chart");
    Ok(output)
}

/// Consistency of the monthly NDVI rasters, saved as CSV.
pub fn verify(config: &PipelineConfig) -> Result<ConsistencyReport> {
    let files = config.ndvi_files()?;
    let report = verify_consistency(&files)?;
    for (path, error) in &report.errors {
        warn!(file = %path.display(), error = %error, "Could not read raster");
    }

    let output = config.proc(CONSISTENCY_CSV);
    create_parent(&output)?;
    report.write_csv(&output)?;
    info!(
        path = %output.display(),
        consistent = report.all_consistent(),
        "Saved consistency report"
    );
    Ok(report)
}

/// Temporal statistics and monthly bands in one raster.
pub fn combine(config: &PipelineConfig, progress: &dyn Progress) -> Result<CombineReport> {
    let files = config.ndvi_files()?;
    let report = combine_ndvi(
        &files,
        &config.proc(COMBINED_TIF),
        Some(config.proc(COMBINED_NAMES).as_path()),
        progress,
    )?;
    for (path, error) in &report.skipped {
        warn!(file = %path.display(), error = %error, "Skipped raster");
    }
    info!(
        path = %report.output.display(),
        bands = report.band_names.len(),
        width = report.width,
        height = report.height,
        "Saved combined NDVI"
    );
    Ok(report)
}

/// Class presence bands of both crop maps on the combined NDVI grid.
pub fn clip(config: &PipelineConfig, progress: &dyn Progress) -> Result<PresenceReport> {
    let reference = config.proc(COMBINED_TIF);
    require_file(&reference, "agro combine")?;

    let report = class_presence(
        &reference,
        &config.mnc(Season::Winter),
        &config.mnc(Season::Summer),
        &config.proc(PRESENCE_TIF),
        Some(config.proc(PRESENCE_NAMES).as_path()),
        &config.grid,
        progress,
    )?;
    info!(
        path = %report.output.display(),
        winter_pct = report.percent(Season::Winter),
        summer_pct = report.percent(Season::Summer),
        "Saved class presence"
    );
    Ok(report)
}

/// Resample a crop map onto the grid of `reference` and save it as uint8
/// with nodata 255. Returns the number of pixels with a class.
pub fn clip_to_reference(classes: &Path, reference: &Path, output: &Path) -> Result<usize> {
    let info = read_info(reference)?;
    let crs = info
        .crs
        .with_context(|| format!("{} has no CRS", reference.display()))?;

    let mut src = GridRaster::open(classes, 1)?;
    src.band.mask_nodata(src.nodata);
    let band = warp_to_grid(
        &src,
        &info.transform,
        crs,
        info.width,
        info.height,
        InterpolationMethod::Nearest,
        f32::NAN,
    )?;

    GeoTiffWriter::new(info.transform, crs)
        .with_nodata(CLASS_NODATA)
        .with_pixel_type(PixelType::UInt8)
        .write(output, &[("", &band)])?;

    let valid = band.valid_count(Some(CLASS_NODATA));
    info!(
        source = %classes.display(),
        output = %output.display(),
        valid_pixels = valid,
        "Clipped crop map"
    );
    Ok(valid)
}

/// Write both clipped crop maps next to the combined NDVI raster.
pub fn export_clips(config: &PipelineConfig) -> Result<Vec<(Season, PathBuf, usize)>> {
    let reference = config.proc(COMBINED_TIF);
    require_file(&reference, "agro combine")?;

    Season::ALL
        .iter()
        .map(|season| {
            let output = config.clip(*season);
            let valid = clip_to_reference(&config.mnc(*season), &reference, &output)?;
            Ok((*season, output, valid))
        })
        .collect()
}

/// Winter clip against summer clip, band count included.
pub fn compare_clips(config: &PipelineConfig) -> Result<ComparisonReport> {
    let winter = RasterProperties::read(config.clip(Season::Winter))?;
    let summer = RasterProperties::read(config.clip(Season::Summer))?;
    let report = ComparisonReport::build(
        "Comparison of the clipped crop maps",
        winter,
        vec![summer],
        true,
    );
    save_comparison(config, &report, CLIP_COMPARISON_CSV, CLIP_COMPARISON_TXT)?;
    Ok(report)
}

/// Both clips against the combined NDVI raster, band count ignored.
pub fn check_reference(config: &PipelineConfig) -> Result<ComparisonReport> {
    let reference = RasterProperties::read(config.proc(COMBINED_TIF))?;
    let clips = Season::ALL
        .iter()
        .map(|season| RasterProperties::read(config.clip(*season)))
        .collect::<grid_processor::Result<Vec<_>>>()?;
    let report = ComparisonReport::build(
        "Clipped crop maps against the combined NDVI raster",
        reference,
        clips,
        false,
    );
    save_comparison(config, &report, REFERENCE_CHECK_CSV, REFERENCE_CHECK_TXT)?;
    Ok(report)
}

fn save_comparison(
    config: &PipelineConfig,
    report: &ComparisonReport,
    csv: &str,
    text: &str,
) -> Result<()> {
    let csv = config.proc(csv);
    let text = config.proc(text);
    create_parent(&csv)?;
    write_properties_csv(&csv, &report.rasters())?;
    report.write_text(&text)?;
    info!(
        csv = %csv.display(),
        text = %text.display(),
        all_match = report.all_match(),
        "Saved comparison report"
    );
    Ok(())
}

/// Clipped crop maps followed by the combined NDVI bands.
pub fn merge(config: &PipelineConfig, progress: &dyn Progress) -> Result<MergeReport> {
    let report = merge_clipped(
        &config.proc(COMBINED_TIF),
        &config.clip(Season::Winter),
        &config.clip(Season::Summer),
        &config.proc(MERGED_TIF),
        Some(config.proc(MERGED_NAMES).as_path()),
        progress,
    )?;
    info!(
        path = %report.output.display(),
        bands = report.band_names.len(),
        "Saved merged raster"
    );
    Ok(report)
}

/// Default NDVI output for a scene: `NDVI_<scene stem>.tif` in `proc_dir`.
pub fn scene_ndvi_path(config: &PipelineConfig, scene: &Path) -> PathBuf {
    let stem = scene
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "escena".to_string());
    config.proc(&format!("NDVI_{}.tif", stem))
}

/// NDVI of the full-band scene. Returns the valid pixel count and the mean.
pub fn scene_ndvi(scene: &Path, output: &Path) -> Result<(usize, Option<f64>)> {
    let band = ndvi_from_scene(scene, output)
        .with_context(|| format!("Failed to derive NDVI from {}", scene.display()))?;
    let valid: Vec<f64> = band
        .data
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| *v as f64)
        .collect();
    let mean = (!valid.is_empty()).then(|| valid.iter().sum::<f64>() / valid.len() as f64);
    Ok((valid.len(), mean))
}

/// PNG preview of a crop map coloured with `style`. Returns the pixel count
/// of every class value.
pub fn render_class_preview(
    input: &Path,
    style: &LandCoverStyle,
    output: &Path,
) -> Result<BTreeMap<i64, u64>> {
    let raster = GridRaster::open(input, 1)?;
    let image = render_classes(&raster.band, style);
    save_png(&image, output).with_context(|| format!("Failed to save {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), "Saved class preview");
    Ok(class_counts(&raster.band))
}

/// PNG preview of an NDVI raster on the NDVI colour ramp.
pub fn render_ndvi_preview(input: &Path, output: &Path) -> Result<()> {
    let mut raster = GridRaster::open_ndvi(input)?;
    raster.band.mask_nodata(raster.nodata);
    let image = render_ramp(&raster.band, &ColorRamp::ndvi());
    save_png(&image, output).with_context(|| format!("Failed to save {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), "Saved NDVI preview");
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn require_file(path: &Path, producer: &str) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("{} not found (run `{}` first)", path.display(), producer);
    }
    Ok(())
}
