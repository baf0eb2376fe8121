//! Sentinel-2 acquisition service.
//!
//! Downloads the monthly NDVI rasters and the full-band scene for the
//! configured area of interest with:
//! - A fixed square AOI projected to the target CRS
//! - Automatic retry with exponential backoff
//! - Skipping of files that already exist
//! - Optional polling until every planned file is present

mod config;
mod download;
mod plan;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::AcquisitionConfig;
use download::{DownloadConfig, DownloadError, DownloadManager, DownloadOutcome};
use plan::DownloadRequest;

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Sentinel-2 NDVI downloader for the crop-class pipeline")]
struct Args {
    /// Acquisition config YAML (defaults apply when omitted)
    #[arg(short, long, env = "ACQUISITION_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single download cycle and exit (vs polling until complete)
    #[arg(long)]
    once: bool,

    /// Print the download plan without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Directory for completed downloads (overrides the config)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Export endpoint URL template (overrides the config)
    #[arg(long, env = "S2_EXPORT_ENDPOINT")]
    endpoint: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

/// Counts for one pass over the plan.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct CycleStats {
    downloaded: usize,
    skipped: usize,
    failed: usize,
    bytes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    let mut config = match &args.config {
        Some(path) => AcquisitionConfig::load(path)?,
        None => AcquisitionConfig::default(),
    };
    if let Some(dir) = args.output_dir.clone() {
        config.output_dir = dir;
    }
    if let Some(endpoint) = args.endpoint.clone() {
        config.endpoint = endpoint;
    }
    config.validate()?;

    let aoi = plan::aoi(&config)?;
    let requests = plan::build_plan(&config)?;
    info!(
        crs = %config.crs,
        aoi = %aoi,
        files = requests.len(),
        output_dir = %config.output_dir.display(),
        "Built download plan"
    );

    if args.dry_run {
        print_plan(&requests);
        return Ok(());
    }

    let manager = DownloadManager::new(DownloadConfig::from_settings(
        &config.download,
        config.output_dir.clone(),
    ))?;

    loop {
        let stats = run_cycle(&manager, &requests).await;
        info!(
            downloaded = stats.downloaded,
            skipped = stats.skipped,
            failed = stats.failed,
            total_bytes = stats.bytes,
            "Download cycle complete"
        );

        if args.once || stats.failed == 0 {
            break;
        }

        let interval = config.download.poll_interval();
        info!(
            missing = stats.failed,
            next_in_secs = interval.as_secs(),
            "Waiting before retrying missing files"
        );
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!(path = %config.output_dir.display(), "Files saved");
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_plan(requests: &[DownloadRequest]) {
    for request in requests {
        println!(
            "{:<36} {:<6} {} .. {}  {}",
            request.file_name, request.product, request.start, request.end, request.url
        );
    }
}

/// Fetch every planned file once. A failing file is logged and the rest of
/// the plan continues.
async fn run_cycle(manager: &DownloadManager, requests: &[DownloadRequest]) -> CycleStats {
    let mut stats = CycleStats::default();

    for request in requests {
        info!(file = %request.file_name, start = %request.start, end = %request.end, "Processing");
        match manager.download(request).await {
            Ok(DownloadOutcome::Downloaded { bytes, .. }) => {
                stats.downloaded += 1;
                stats.bytes += bytes;
            }
            Ok(DownloadOutcome::Skipped { .. }) => stats.skipped += 1,
            Err(e @ DownloadError::TooLarge { .. }) => {
                stats.failed += 1;
                warn!(
                    file = %request.file_name,
                    error = %e,
                    "File exceeds the direct download limit; reduce buffer_m or export it separately"
                );
            }
            Err(e) => {
                stats.failed += 1;
                error!(file = %request.file_name, error = %e, "Could not download file");
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cycle_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("NDVI_2023-06.tif"), b"x").unwrap();

        let mut config = AcquisitionConfig::default();
        config.start_month = agro_common::MonthPeriod::new(2023, 6).unwrap();
        config.end_month = agro_common::MonthPeriod::new(2023, 7).unwrap();
        // Nothing listens here, so every request fails
        config.endpoint = "http://127.0.0.1:9/{product}?start={start}&end={end}".to_string();
        let requests = plan::build_plan(&config).unwrap();

        let manager = DownloadManager::new(DownloadConfig {
            max_retries: 0,
            initial_retry_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
            max_bytes: 1024,
            output_dir: dir.path().to_path_buf(),
            show_progress: false,
        })
        .unwrap();

        let stats = run_cycle(&manager, &requests).await;
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.downloaded, 0);
    }
}
