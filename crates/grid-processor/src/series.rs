//! Monthly NDVI series per crop class for both seasons.

use crate::config::GridProcessorConfig;
use crate::error::Result;
use crate::progress::Progress;
use crate::types::{GridRaster, Season};
use crate::zonal::zonal_class_means;
use agro_common::LandCoverStyle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// NDVI per class and month for one season's crop map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSeries {
    pub season: Season,
    /// Class values in ascending order, excluded values removed
    pub classes: Vec<i64>,
    /// Label of each class, aligned with `classes`
    pub labels: Vec<String>,
    /// Hex colour of each class, aligned with `classes`
    pub colors: Vec<String>,
    /// Month labels ("YYYY-MM"), one per NDVI file
    pub months: Vec<String>,
    /// Per class, one mean per month (`null` where no value)
    pub values: BTreeMap<i64, Vec<Option<f64>>>,
}

impl SeasonSeries {
    /// Empty series for the non-excluded classes of `style`.
    pub fn new(season: Season, style: &LandCoverStyle, exclude: &[i64]) -> Self {
        let entries = style.valid_classes(exclude);
        Self {
            season,
            classes: entries.iter().map(|e| e.value).collect(),
            labels: entries.iter().map(|e| e.label.clone()).collect(),
            colors: entries.iter().map(|e| e.color.to_hex()).collect(),
            months: Vec::new(),
            values: entries.iter().map(|e| (e.value, Vec::new())).collect(),
        }
    }

    /// Append one month. Classes missing from `means` get `None`.
    pub fn push_month(&mut self, month: impl Into<String>, means: &BTreeMap<i64, Option<f64>>) {
        self.months.push(month.into());
        for class in &self.classes {
            let value = means.get(class).copied().flatten();
            self.values.entry(*class).or_default().push(value);
        }
    }

    /// Append a month for which nothing could be computed.
    pub fn push_failed_month(&mut self, month: impl Into<String>) {
        self.push_month(month, &BTreeMap::new());
    }

    /// Values of one class, one per month.
    pub fn class_values(&self, class: i64) -> &[Option<f64>] {
        self.values.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Annual statistics per class over the months with a value.
    pub fn summarize(&self) -> Vec<SeriesSummary> {
        self.classes
            .iter()
            .zip(self.labels.iter())
            .map(|(class, label)| {
                let valid: Vec<f64> = self.class_values(*class).iter().flatten().copied().collect();
                let mean = if valid.is_empty() {
                    None
                } else {
                    Some(valid.iter().sum::<f64>() / valid.len() as f64)
                };
                SeriesSummary {
                    class: *class,
                    label: label.clone(),
                    mean,
                    min: valid.iter().copied().reduce(f64::min),
                    max: valid.iter().copied().reduce(f64::max),
                    valid_months: valid.len(),
                }
            })
            .collect()
    }

    /// True when at least one class has at least one value.
    pub fn has_values(&self) -> bool {
        self.values.values().any(|v| v.iter().any(Option::is_some))
    }
}

/// Annual NDVI statistics of one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub class: i64,
    pub label: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub valid_months: usize,
}

/// Results of the zonal step for both seasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdviByClass {
    pub invierno: SeasonSeries,
    pub verano: SeasonSeries,
}

impl NdviByClass {
    pub fn season(&self, season: Season) -> &SeasonSeries {
        match season {
            Season::Winter => &self.invierno,
            Season::Summer => &self.verano,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| crate::GridProcessorError::read_failed(format!("{}: {}", path.as_ref().display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| crate::GridProcessorError::read_failed(e.to_string()))
    }
}

/// Month label of an NDVI file: the part after `NDVI_` in its stem, or the
/// whole stem.
pub fn month_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_prefix("NDVI_") {
        Some(rest) => rest.to_string(),
        None => stem,
    }
}

/// Monthly class means of one season.
///
/// The class raster must open; an NDVI file that fails to open or process
/// contributes `None` for every class.
pub fn season_series(
    season: Season,
    classes_path: &Path,
    ndvi_files: &[PathBuf],
    style: &LandCoverStyle,
    config: &GridProcessorConfig,
    progress: &dyn Progress,
) -> Result<SeasonSeries> {
    let classes = GridRaster::open(classes_path, 1)?;
    let mut series = SeasonSeries::new(season, style, &config.exclude_values);
    info!(
        season = %season,
        classes = series.classes.len(),
        months = ndvi_files.len(),
        "Processing season"
    );

    for (i, path) in ndvi_files.iter().enumerate() {
        let month = month_label(path);
        let result = GridRaster::open_ndvi(path).and_then(|ndvi| {
            zonal_class_means(&classes, ndvi, &series.classes, config, progress)
        });
        match result {
            Ok(stats) => {
                info!(
                    season = %season,
                    month = %month,
                    index = i + 1,
                    total = ndvi_files.len(),
                    failed_windows = stats.failed_windows,
                    "Month processed"
                );
                series.push_month(month, &stats.means);
            }
            Err(e) => {
                error!(season = %season, month = %month, error = %e, "Month failed");
                series.push_failed_month(month);
            }
        }
    }

    Ok(series)
}
