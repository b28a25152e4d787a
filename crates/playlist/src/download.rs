//! Concurrent segment download with counted progress.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{PlaylistError, Result};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Directory receiving the segments of the manifest named `manifest_name`.
pub fn segments_dir(output_dir: &Path, manifest_name: &str) -> PathBuf {
    let stem = manifest_name.strip_suffix(".m3u8").unwrap_or(manifest_name);
    output_dir.join(format!("{stem}_segments"))
}

/// Name of the `index`-th segment on disk, independent of its URL.
pub fn segment_filename(index: usize) -> String {
    format!("segment_{index:04}.ts")
}

/// Completed segments so far, reported after every successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.done as f64 * 100.0 / self.total as f64
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "downloaded {}/{} ({:.1}%)",
            self.done,
            self.total,
            self.percent()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub success: usize,
    pub total: usize,
}

impl DownloadSummary {
    pub fn is_complete(&self) -> bool {
        self.success == self.total
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.success, self.total)
    }
}

type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Downloads a list of segment URLs with a bounded number of workers.
pub struct SegmentDownloader {
    client: Client,
    workers: usize,
}

impl SegmentDownloader {
    pub fn new(workers: usize, timeout: Duration) -> Result<Self> {
        install_rustls_provider();
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, workers)
    }

    pub fn with_client(client: Client, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(PlaylistError::settings("at least one worker is required"));
        }
        Ok(Self { client, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetches every URL into `dir` as `segment_NNNN.ts`.
    ///
    /// Failed segments are logged and left out of the success count.
    /// `on_progress` runs under the counter lock, so reports never interleave.
    pub async fn download_all<F>(
        &self,
        urls: &[String],
        dir: &Path,
        on_progress: F,
    ) -> Result<DownloadSummary>
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        let total = urls.len();
        if total == 0 {
            return Ok(DownloadSummary { success: 0, total });
        }
        tokio::fs::create_dir_all(dir).await?;
        info!(segments = total, workers = self.workers, "downloading segments");

        let permits = Arc::new(Semaphore::new(self.workers));
        let success = Arc::new(Mutex::new(0usize));
        let on_progress: ProgressCallback = Arc::new(on_progress);
        let mut tasks = JoinSet::new();

        for (index, url) in urls.iter().enumerate() {
            let client = self.client.clone();
            let permits = Arc::clone(&permits);
            let success = Arc::clone(&success);
            let on_progress = Arc::clone(&on_progress);
            let url = url.clone();
            let path = dir.join(segment_filename(index));

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                match fetch_segment(&client, &url, &path).await {
                    Ok(bytes) => {
                        debug!(url = %url, bytes, "segment saved");
                        let mut done = success.lock();
                        *done += 1;
                        on_progress(Progress { done: *done, total });
                    }
                    Err(PlaylistError::HttpStatus { status, .. }) => {
                        warn!(url = %url, status = %status, "segment download failed")
                    }
                    Err(e) => warn!(url = %url, error = %e, "segment download error"),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = ?e, "segment task failed");
            }
        }

        let success = *success.lock();
        Ok(DownloadSummary { success, total })
    }
}

async fn fetch_segment(client: &Client, url: &str, path: &Path) -> Result<usize> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(PlaylistError::HttpStatus {
            status,
            url: url.to_owned(),
        });
    }
    let body = response.bytes().await?;
    tokio::fs::write(path, &body).await?;
    Ok(body.len())
}

/// Installs the process-wide rustls crypto provider every HTTP client here needs.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_segments_by_position() {
        assert_eq!(segment_filename(0), "segment_0000.ts");
        assert_eq!(segment_filename(123), "segment_0123.ts");
    }

    #[test]
    fn segment_dir_follows_manifest_stem() {
        assert_eq!(
            segments_dir(Path::new("temp"), "room_42.m3u8"),
            Path::new("temp").join("room_42_segments")
        );
    }

    #[test]
    fn progress_reads_like_a_counter() {
        let progress = Progress { done: 1, total: 3 };
        assert_eq!(progress.to_string(), "downloaded 1/3 (33.3%)");
        assert_eq!(DownloadSummary { success: 2, total: 3 }.to_string(), "2/3");
    }

    #[test]
    fn zero_workers_are_rejected() {
        install_rustls_provider();
        assert!(matches!(
            SegmentDownloader::with_client(Client::new(), 0),
            Err(PlaylistError::Settings { .. })
        ));
    }
}
