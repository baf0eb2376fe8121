//! Download plan: one NDVI request per month plus the full-band scene.

use agro_common::{BoundingBox, CrsCode, MonthPeriod};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt;

use crate::config::AcquisitionConfig;

/// What a request asks the export endpoint for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    /// Single NDVI band computed from B8 and B4
    Ndvi,
    /// The configured Sentinel-2 bands of the least cloudy scene
    Bands,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Ndvi => "ndvi",
            Product::Bands => "bands",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single file to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub file_name: String,
    pub product: Product,
    /// Search window start (inclusive)
    pub start: NaiveDate,
    /// Search window end (exclusive)
    pub end: NaiveDate,
    pub url: String,
}

/// Square area of interest in the target CRS.
///
/// The centre is projected first and the buffer applied in meters, so every
/// month shares exactly the same extent.
pub fn aoi(config: &AcquisitionConfig) -> Result<BoundingBox> {
    let crs = config.target_crs()?;
    let (x, y) = projection::transform_point(
        CrsCode::Epsg4326,
        crs,
        config.center.lon,
        config.center.lat,
    )
    .context("Failed to project the area of interest centre")?;
    Ok(BoundingBox::around(x, y, config.buffer_m))
}

/// Expand `{name}` placeholders in `template`.
///
/// Known placeholders: `{product}`, `{collection}`, `{start}`, `{end}`,
/// `{bbox}`, `{crs}`, `{scale}`, `{bands}`, `{max_cloud}`. Unknown ones are
/// left as they are.
pub fn render_url(template: &str, values: &[(&str, String)]) -> String {
    let mut url = template.to_string();
    for (name, value) in values {
        url = url.replace(&format!("{{{}}}", name), value);
    }
    url
}

/// Build the complete plan for `config`.
pub fn build_plan(config: &AcquisitionConfig) -> Result<Vec<DownloadRequest>> {
    let bbox = aoi(config)?;
    let bbox_str = format!(
        "{:.2},{:.2},{:.2},{:.2}",
        bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
    );

    let request = |product: Product, period: MonthPeriod, file_name: String| {
        let bands = match product {
            Product::Ndvi => "B8,B4".to_string(),
            Product::Bands => config.bands.join(","),
        };
        let (start, end) = (period.first_day(), period.exclusive_end());
        let values = [
            ("product", product.to_string()),
            ("collection", config.collection.clone()),
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
            ("bbox", bbox_str.clone()),
            ("crs", config.crs.clone()),
            ("scale", config.scale.to_string()),
            ("bands", bands),
            ("max_cloud", config.max_cloud.to_string()),
        ];
        DownloadRequest {
            file_name,
            product,
            start,
            end,
            url: render_url(&config.endpoint, &values),
        }
    };

    let mut plan: Vec<DownloadRequest> = config
        .months()
        .into_iter()
        .map(|month| request(Product::Ndvi, month, format!("NDVI_{}.tif", month.label())))
        .collect();

    plan.push(request(
        Product::Bands,
        MonthPeriod::of(config.scene_date),
        format!(
            "Sentinel2_{}bandas_{}.tif",
            config.bands.len(),
            config.scene_date.format("%Y-%m-%d")
        ),
    ));

    Ok(plan)
}
