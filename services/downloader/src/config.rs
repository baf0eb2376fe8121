//! Acquisition settings for the Sentinel-2 downloads.
//!
//! Every field has a default matching the Tres Arroyos campaign, so a YAML
//! file only needs the values it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agro_common::{months_between, CrsCode, MonthPeriod};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

/// Direct download limit of the imagery export endpoint.
pub const DIRECT_DOWNLOAD_LIMIT: u64 = 50_331_648;

/// Root configuration loaded from an acquisition YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Centre of the area of interest (WGS84 degrees)
    pub center: Center,
    /// Half-size of the square area of interest, in meters
    pub buffer_m: f64,
    /// Target CRS of every request, e.g. "EPSG:32721"
    pub crs: String,
    /// Pixel size in meters
    pub scale: f64,
    /// Maximum cloudy pixel percentage of the scenes considered
    pub max_cloud: f64,
    pub collection: String,
    pub start_month: MonthPeriod,
    pub end_month: MonthPeriod,
    /// The full-band scene is searched over the month of this date
    pub scene_date: NaiveDate,
    pub bands: Vec<String>,
    pub output_dir: PathBuf,
    /// URL template, see [`crate::plan::render_url`] for the placeholders
    pub endpoint: String,
    pub download: DownloadSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Center {
    pub lon: f64,
    pub lat: f64,
}

/// Retry and size limits of the HTTP downloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub max_retries: u32,
    pub initial_retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
    /// Pause between cycles when not running with `--once`
    pub poll_interval_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay_secs: 2,
            max_retry_delay_secs: 120,
            request_timeout_secs: 300,
            max_bytes: DIRECT_DOWNLOAD_LIMIT,
            poll_interval_secs: 3600,
        }
    }
}

impl DownloadSettings {
    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_secs(self.initial_retry_delay_secs)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(self.max_retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            center: Center {
                lon: -60.2793,
                lat: -38.3731,
            },
            buffer_m: 14_000.0,
            crs: "EPSG:32721".to_string(),
            scale: 10.0,
            max_cloud: 30.0,
            collection: "COPERNICUS/S2_SR_HARMONIZED".to_string(),
            start_month: MonthPeriod { year: 2023, month: 6 },
            end_month: MonthPeriod { year: 2024, month: 6 },
            scene_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            bands: [
                "B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B8A", "B9", "B11", "B12", "QA60",
            ]
            .iter()
            .map(|b| b.to_string())
            .collect(),
            output_dir: PathBuf::from("data/raw/sentinel_23_24"),
            endpoint: "http://127.0.0.1:8090/export/{product}?collection={collection}\
                       &start={start}&end={end}&bbox={bbox}&crs={crs}&scale={scale}\
                       &bands={bands}&max_cloud={max_cloud}"
                .to_string(),
            download: DownloadSettings::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Load and validate an acquisition configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded acquisition config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AcquisitionConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.target_crs()?;
        if !(self.buffer_m > 0.0) {
            bail!("buffer_m must be positive, got {}", self.buffer_m);
        }
        if !(self.scale > 0.0) {
            bail!("scale must be positive, got {}", self.scale);
        }
        if !(0.0..=100.0).contains(&self.max_cloud) {
            bail!("max_cloud must be a percentage, got {}", self.max_cloud);
        }
        if self.start_month > self.end_month {
            bail!(
                "start_month {} is after end_month {}",
                self.start_month,
                self.end_month
            );
        }
        if self.bands.is_empty() {
            bail!("at least one band is required");
        }
        if !self.endpoint.contains("{start}") || !self.endpoint.contains("{end}") {
            bail!("endpoint must contain the {{start}} and {{end}} placeholders");
        }
        Ok(())
    }

    pub fn target_crs(&self) -> Result<CrsCode> {
        CrsCode::from_string(&self.crs).with_context(|| format!("Unsupported CRS {}", self.crs))
    }

    /// Monthly NDVI periods, both ends included.
    pub fn months(&self) -> Vec<MonthPeriod> {
        months_between(self.start_month, self.end_month)
    }
}
