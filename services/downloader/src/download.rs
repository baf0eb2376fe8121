//! Streaming download manager with retry logic.
//!
//! Key features:
//! - Exponential backoff retry on transient failures
//! - Partial `.part` file renamed into place on completion
//! - Files already present in the output directory are skipped
//! - Responses larger than the direct download limit fail without retry

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{header, Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::{DownloadSettings, DIRECT_DOWNLOAD_LIMIT};
use crate::plan::DownloadRequest;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("{file} is {size} bytes, more than the direct download limit of {limit} bytes")]
    TooLarge { file: String, size: u64, limit: u64 },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<DownloadError> },
}

impl DownloadError {
    /// Oversized files and client errors fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::TooLarge { .. } | DownloadError::RetriesExhausted { .. } => false,
            DownloadError::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            DownloadError::Http(_) | DownloadError::Io(_) => true,
        }
    }
}

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Largest accepted response body
    pub max_bytes: u64,
    /// Directory for completed downloads
    pub output_dir: PathBuf,
    /// Draw a terminal progress bar per file
    pub show_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(120),
            request_timeout: Duration::from_secs(300),
            max_bytes: DIRECT_DOWNLOAD_LIMIT,
            output_dir: PathBuf::from("data/raw/sentinel_23_24"),
            show_progress: true,
        }
    }
}

impl DownloadConfig {
    pub fn from_settings(settings: &DownloadSettings, output_dir: PathBuf) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_retry_delay: settings.initial_retry_delay(),
            max_retry_delay: settings.max_retry_delay(),
            request_timeout: settings.request_timeout(),
            max_bytes: settings.max_bytes,
            output_dir,
            show_progress: true,
        }
    }
}

/// Result of a single planned download.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    /// The file was already present
    Skipped { path: PathBuf },
}

impl DownloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DownloadOutcome::Downloaded { path, .. } | DownloadOutcome::Skipped { path } => path,
        }
    }
}

/// Manages downloads with retry support.
pub struct DownloadManager {
    client: Client,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Download `request` into the output directory, retrying transient
    /// failures with exponential backoff.
    #[instrument(skip(self, request), fields(file = %request.file_name))]
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        fs::create_dir_all(&self.config.output_dir).await?;

        let final_path = self.config.output_dir.join(&request.file_name);
        let part_path = self
            .config
            .output_dir
            .join(format!("{}.part", request.file_name));

        if fs::try_exists(&final_path).await? {
            info!(path = %final_path.display(), "File already exists, skipping download");
            return Ok(DownloadOutcome::Skipped { path: final_path });
        }

        let mut attempt = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            attempt += 1;
            match self.fetch(request, &part_path).await {
                Ok(bytes) => {
                    fs::rename(&part_path, &final_path).await?;
                    info!(
                        path = %final_path.display(),
                        bytes,
                        size_mb = format!("{:.2}", bytes as f64 / (1024.0 * 1024.0)),
                        "Download completed"
                    );
                    return Ok(DownloadOutcome::Downloaded {
                        path: final_path,
                        bytes,
                    });
                }
                Err(e) => {
                    fs::remove_file(&part_path).await.ok();

                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempt > self.config.max_retries {
                        return Err(DownloadError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    warn!(
                        error = %e,
                        retry = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }

    /// One attempt: stream the response body into `part_path`.
    async fn fetch(&self, request: &DownloadRequest, part_path: &Path) -> Result<u64, DownloadError> {
        debug!(url = %request.url, "Requesting");
        let response = self.client.get(&request.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: request.url.clone(),
                status,
            });
        }

        let declared: Option<u64> = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        if let Some(size) = declared {
            self.check_size(request, size)?;
        }

        let progress = self.progress_bar(&request.file_name, declared);
        let mut file = fs::File::create(part_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            // Servers without Content-Length are held to the same limit
            self.check_size(request, written)?;

            file.write_all(&chunk).await?;
            progress.inc(chunk.len() as u64);
        }

        file.flush().await?;
        file.sync_all().await?;
        progress.finish_and_clear();

        Ok(written)
    }

    fn check_size(&self, request: &DownloadRequest, size: u64) -> Result<(), DownloadError> {
        if size > self.config.max_bytes {
            return Err(DownloadError::TooLarge {
                file: request.file_name.clone(),
                size,
                limit: self.config.max_bytes,
            });
        }
        Ok(())
    }

    fn progress_bar(&self, name: &str, total: Option<u64>) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = match total {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes}")
                {
                    pb.set_style(style.progress_chars("##-"));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        pb.set_message(name.to_string());
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Product;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve one canned response per connection, in order.
    async fn serve(responses: Vec<(u16, Vec<u8>)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 {} Test\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/export", addr), hits)
    }

    fn request(url: &str, name: &str) -> DownloadRequest {
        DownloadRequest {
            file_name: name.to_string(),
            product: Product::Ndvi,
            start: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
            url: url.to_string(),
        }
    }

    fn manager(dir: &Path, max_bytes: u64) -> DownloadManager {
        DownloadManager::new(DownloadConfig {
            max_retries: 2,
            initial_retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(20),
            request_timeout: Duration::from_secs(10),
            max_bytes,
            output_dir: dir.to_path_buf(),
            show_progress: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (url, hits) = serve(vec![(200, b"tiff bytes".to_vec())]).await;

        let outcome = manager(dir.path(), 1024)
            .download(&request(&url, "NDVI_2023-06.tif"))
            .await
            .unwrap();

        let path = dir.path().join("NDVI_2023-06.tif");
        assert_eq!(outcome, DownloadOutcome::Downloaded { path: path.clone(), bytes: 10 });
        assert_eq!(std::fs::read(&path).unwrap(), b"tiff bytes");
        assert!(!dir.path().join("NDVI_2023-06.tif.part").exists());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("NDVI_2023-07.tif"), b"old").unwrap();

        // Nothing listens on this port; a request would fail
        let outcome = manager(dir.path(), 1024)
            .download(&request("http://127.0.0.1:9/export", "NDVI_2023-07.tif"))
            .await;

        let outcome = tokio_test::assert_ok!(outcome);
        assert!(matches!(outcome, DownloadOutcome::Skipped { .. }));
        assert_eq!(std::fs::read(outcome.path()).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (url, hits) = serve(vec![(500, Vec::new()), (200, b"ok".to_vec())]).await;

        let outcome = manager(dir.path(), 1024)
            .download(&request(&url, "NDVI_2023-08.tif"))
            .await
            .unwrap();

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 2, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_too_large_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (url, hits) = serve(vec![(200, vec![0u8; 64]), (200, vec![0u8; 64])]).await;

        let err = manager(dir.path(), 32)
            .download(&request(&url, "Sentinel2_13bandas_2024-01-01.tif"))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::TooLarge { size: 64, limit: 32, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("Sentinel2_13bandas_2024-01-01.tif").exists());
        assert!(!dir.path().join("Sentinel2_13bandas_2024-01-01.tif.part").exists());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (url, hits) = serve(vec![(404, Vec::new()), (200, b"late".to_vec())]).await;

        let err = manager(dir.path(), 1024)
            .download(&request(&url, "NDVI_2023-09.tif"))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Status { status: StatusCode::NOT_FOUND, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let (url, hits) = serve(vec![(503, Vec::new()); 3]).await;

        let err = manager(dir.path(), 1024)
            .download(&request(&url, "NDVI_2023-10.tif"))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retryable_classification() {
        let status = |code: u16| DownloadError::Status {
            url: String::new(),
            status: StatusCode::from_u16(code).unwrap(),
        };
        assert!(status(502).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!DownloadError::TooLarge { file: String::new(), size: 2, limit: 1 }.is_retryable());
    }
}
