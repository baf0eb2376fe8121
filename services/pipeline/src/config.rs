//! Pipeline configuration: where every input and output lives.
//!
//! Defaults follow the project layout:
//!
//! ```text
//! data/raw/sentinel_23_24/NDVI_YYYY-MM.tif
//! data/raw/INTA_23_24/MNC_invierno2023.tif, MNC_verano-2024.tif, *.qml
//! data/proc/<step outputs>
//! scripts/img/3_evolucion_ndvi_por_categoria.png
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use grid_processor::{GridProcessorConfig, Season};
use serde::Deserialize;
use tracing::debug;

/// Root configuration loaded from a YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Monthly NDVI rasters (`NDVI_*.tif`)
    pub ndvi_dir: PathBuf,
    /// INTA crop maps and their QML styles
    pub inta_dir: PathBuf,
    /// Step outputs
    pub proc_dir: PathBuf,
    /// Charts and previews
    pub img_dir: PathBuf,

    pub mnc_winter: String,
    pub mnc_summer: String,
    pub style_winter: String,
    pub style_summer: String,
    /// Crop maps clipped to the combined NDVI grid, inside `proc_dir`
    pub clip_winter: String,
    pub clip_summer: String,
    /// Full-band Sentinel-2 scene inside `ndvi_dir`
    pub scene: String,

    pub chart: ChartConfig,
    pub grid: GridProcessorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    /// TrueType font for titles and labels; charts are drawn without text
    /// when unset
    pub font: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 800,
            font: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ndvi_dir: PathBuf::from("data/raw/sentinel_23_24"),
            inta_dir: PathBuf::from("data/raw/INTA_23_24"),
            proc_dir: PathBuf::from("data/proc"),
            img_dir: PathBuf::from("scripts/img"),
            mnc_winter: "MNC_invierno2023.tif".to_string(),
            mnc_summer: "MNC_verano-2024.tif".to_string(),
            style_winter: "MNC_inv23.qml".to_string(),
            style_summer: "MNC_ver24.qml".to_string(),
            clip_winter: "recorte_invierno_GTiff.tif".to_string(),
            clip_summer: "recorte_verano_GTiff.tif".to_string(),
            scene: "Sentinel2_13bandas_2024-01-01.tif".to_string(),
            chart: ChartConfig::default(),
            grid: GridProcessorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file, or the defaults when `path` is `None`.
    ///
    /// Processing settings are then overridden from `AGRO_*` environment
    /// variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let config: PipelineConfig = serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
                debug!(path = %path.display(), "Loaded pipeline config");
                config
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        let env = GridProcessorConfig::from_env();
        let defaults = GridProcessorConfig::default();
        if env.chunk_size != defaults.chunk_size {
            self.grid.chunk_size = env.chunk_size;
        }
        if env.exclude_values != defaults.exclude_values {
            self.grid.exclude_values = env.exclude_values;
        }
        if env.interpolation != defaults.interpolation {
            self.grid.interpolation = env.interpolation;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.grid
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid grid settings: {}", e))?;
        if self.chart.width == 0 || self.chart.height == 0 {
            anyhow::bail!("chart width and height must be positive");
        }
        Ok(())
    }

    pub fn mnc(&self, season: Season) -> PathBuf {
        match season {
            Season::Winter => self.inta_dir.join(&self.mnc_winter),
            Season::Summer => self.inta_dir.join(&self.mnc_summer),
        }
    }

    pub fn style(&self, season: Season) -> PathBuf {
        match season {
            Season::Winter => self.inta_dir.join(&self.style_winter),
            Season::Summer => self.inta_dir.join(&self.style_summer),
        }
    }

    pub fn clip(&self, season: Season) -> PathBuf {
        match season {
            Season::Winter => self.proc_dir.join(&self.clip_winter),
            Season::Summer => self.proc_dir.join(&self.clip_summer),
        }
    }

    pub fn scene_path(&self) -> PathBuf {
        self.ndvi_dir.join(&self.scene)
    }

    /// Output of a numbered step inside `proc_dir`.
    pub fn proc(&self, name: &str) -> PathBuf {
        self.proc_dir.join(name)
    }

    pub fn chart_path(&self) -> PathBuf {
        self.img_dir.join("3_evolucion_ndvi_por_categoria.png")
    }

    /// Monthly NDVI rasters in `ndvi_dir`, sorted by name.
    pub fn ndvi_files(&self) -> Result<Vec<PathBuf>> {
        list_ndvi_files(&self.ndvi_dir)
    }
}

/// `NDVI_*.tif` files in `dir`, sorted by name.
pub fn list_ndvi_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list NDVI directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("NDVI_") && name.ends_with(".tif") && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.mnc(Season::Winter),
            PathBuf::from("data/raw/INTA_23_24/MNC_invierno2023.tif")
        );
        assert_eq!(
            config.style(Season::Summer),
            PathBuf::from("data/raw/INTA_23_24/MNC_ver24.qml")
        );
        assert_eq!(
            config.clip(Season::Summer),
            PathBuf::from("data/proc/recorte_verano_GTiff.tif")
        );
        assert_eq!(
            config.chart_path(),
            PathBuf::from("scripts/img/3_evolucion_ndvi_por_categoria.png")
        );
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
proc_dir: /tmp/proc
chart:
  width: 1200
grid:
  chunk_size: 256
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.proc("x.csv"), PathBuf::from("/tmp/proc/x.csv"));
        assert_eq!(config.chart.width, 1200);
        assert_eq!(config.chart.height, 800);
        assert_eq!(config.grid.chunk_size, 256);
        assert_eq!(config.grid.exclude_values, vec![0, 255]);
        assert_eq!(config.mnc_summer, "MNC_verano-2024.tif");
    }

    #[test]
    fn test_list_ndvi_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "NDVI_2024-01.tif",
            "NDVI_2023-06.tif",
            "Sentinel2_13bandas_2024-01-01.tif",
            "NDVI_2023-07.tif.part",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = list_ndvi_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["NDVI_2023-06.tif", "NDVI_2024-01.tif"]);
    }

    #[test]
    fn test_missing_ndvi_dir_is_error() {
        assert!(list_ndvi_files(Path::new("/nonexistent/ndvi")).is_err());
    }
}
