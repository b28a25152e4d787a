//! Dedup & fetch scheduling for discovered manifest URLs.
//!
//! A URL is claimed in the [`ManifestSet`] before its fetch is spawned, so a
//! burst of identical detections yields one request. Claims are never
//! released: failed fetches are not retried within a session.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use m3u8_rs::Playlist;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::FetchConfig;
use crate::error::{Result, SnifferError};
use crate::extractor::{is_manifest_url, is_media_url};
use crate::http_client::build_manifest_client;
use crate::utils::manifest_filename;

/// Header every manifest body must carry.
pub const MANIFEST_HEADER: &str = "#EXTM3U";

/// Number of segment references echoed to the log per saved manifest.
const LOGGED_SEGMENTS: usize = 3;

/// URLs already handed to a fetch during this session.
///
/// Grows monotonically and is never persisted.
#[derive(Debug, Default)]
pub struct ManifestSet {
    urls: Mutex<HashSet<String>>,
}

impl ManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.lock().contains(url)
    }

    /// Inserts `url` if absent and returns the set size after insertion.
    /// Check and insert happen under one lock.
    pub fn claim(&self, url: &str) -> Option<usize> {
        let mut urls = self.urls.lock();
        if urls.insert(url.to_owned()) {
            Some(urls.len())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.lock().is_empty()
    }
}

/// A manifest written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedManifest {
    pub url: String,
    pub path: PathBuf,
    pub bytes: usize,
}

/// What the saved bytes turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestReport {
    NotUtf8,
    MissingHeader,
    Media {
        segments: Vec<String>,
    },
    Master {
        variants: usize,
    },
}

/// Issues at most one fetch per distinct manifest URL, off the caller's path.
pub struct FetchScheduler {
    seen: ManifestSet,
    client: Client,
    config: Arc<FetchConfig>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl FetchScheduler {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = build_manifest_client(&config)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: FetchConfig) -> Self {
        Self {
            seen: ManifestSet::new(),
            client,
            config: Arc::new(config),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn attempted(&self) -> &ManifestSet {
        &self.seen
    }

    /// Whether `url` is new and looks like a manifest or streaming media.
    /// Does not change any state.
    pub fn should_download(&self, url: &str) -> bool {
        if self.seen.contains(url) {
            debug!(url = %url, "already attempted");
            return false;
        }
        if is_manifest_url(url) {
            return true;
        }
        if is_media_url(url) {
            debug!(url = %url, "media url accepted");
            return true;
        }
        false
    }

    /// Claims `url` and spawns its fetch without waiting for it.
    ///
    /// Returns `false` when the URL is rejected or was already claimed.
    pub fn download(&self, url: &str) -> bool {
        if !self.should_download(url) {
            return false;
        }
        let Some(ordinal) = self.seen.claim(url) else {
            return false;
        };

        info!(url = %url, "fetching manifest");
        let client = self.client.clone();
        let config = Arc::clone(&self.config);
        let cancel = self.cancel.clone();
        let url = url.to_owned();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(url = %url, "manifest fetch cancelled");
                }
                result = fetch_manifest(&client, &config, &url, ordinal) => {
                    if let Err(e) = result {
                        log_failure(&url, &e);
                    }
                }
            }
        });
        true
    }

    /// Number of fetches still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every spawned fetch to finish.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancels in-flight fetches and waits for their tasks to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!(attempted = self.seen.len(), "fetch scheduler stopped");
    }
}

fn log_failure(url: &str, e: &SnifferError) {
    match e {
        SnifferError::HttpStatus { status, .. } => {
            warn!(url = %url, status = %status, "manifest download failed")
        }
        SnifferError::Network { source } if source.is_timeout() => {
            error!(url = %url, "manifest download timed out")
        }
        other => error!(url = %url, error = %other, "manifest download error"),
    }
}

/// Fetches one manifest and writes its raw bytes into the manifest directory.
pub async fn fetch_manifest(
    client: &Client,
    config: &FetchConfig,
    url: &str,
    ordinal: usize,
) -> Result<SavedManifest> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(SnifferError::HttpStatus {
            status,
            url: url.to_owned(),
        });
    }
    let body = response.bytes().await?;

    let filename = manifest_filename(url, ordinal);
    let path = save(&config.manifest_dir, &filename, &body).await?;
    info!(file = %filename, bytes = body.len(), "manifest saved");

    log_report(&filename, &inspect_manifest(&body));

    Ok(SavedManifest {
        url: url.to_owned(),
        path,
        bytes: body.len(),
    })
}

async fn save(dir: &Path, filename: &str, body: &Bytes) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

/// Looks at saved bytes for observability; never triggers further fetches.
pub fn inspect_manifest(body: &[u8]) -> ManifestReport {
    let Ok(text) = std::str::from_utf8(body) else {
        return ManifestReport::NotUtf8;
    };
    if !text.contains(MANIFEST_HEADER) {
        return ManifestReport::MissingHeader;
    }

    if let Ok(Playlist::MasterPlaylist(master)) = m3u8_rs::parse_playlist_res(body) {
        return ManifestReport::Master {
            variants: master.variants.len(),
        };
    }

    let segments = text
        .lines()
        .filter(|line| playlist::is_segment_reference(line))
        .map(str::to_owned)
        .collect();
    ManifestReport::Media { segments }
}

fn log_report(filename: &str, report: &ManifestReport) {
    match report {
        ManifestReport::NotUtf8 => {
            warn!(file = %filename, "manifest is not valid UTF-8")
        }
        ManifestReport::MissingHeader => {
            debug!(file = %filename, "saved body has no {MANIFEST_HEADER} header")
        }
        ManifestReport::Master { variants } => {
            info!(file = %filename, variants, "master playlist saved")
        }
        ManifestReport::Media { segments } => {
            info!(file = %filename, "valid manifest saved");
            if !segments.is_empty() {
                info!(file = %filename, segments = segments.len(), "manifest lists segments");
                for (i, segment) in segments.iter().take(LOGGED_SEGMENTS).enumerate() {
                    info!(index = i + 1, segment = %segment, "segment");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_check_and_insert() {
        let set = ManifestSet::new();
        assert_eq!(set.claim("https://a/x.m3u8"), Some(1));
        assert_eq!(set.claim("https://a/x.m3u8"), None);
        assert_eq!(set.claim("https://a/y.m3u8"), Some(2));
        assert_eq!(set.len(), 2);
    }

    fn offline_scheduler() -> FetchScheduler {
        playlist::install_rustls_provider();
        FetchScheduler::with_client(Client::new(), FetchConfig::default())
    }

    #[test]
    fn should_download_accepts_manifests_and_media() {
        let scheduler = offline_scheduler();
        let cases = [
            ("https://cdn.example.com/live/room.m3u8?token=x", true),
            ("https://cdn.example.com/live/seg_1.ts", true),
            ("https://cdn.example.com/live/seg_1.ts?auth=1", true),
            ("https://cdn.example.com/live/chunk.m4s", true),
            ("https://cdn.example.com/vod/clip.mp4", true),
            ("https://cdn.example.com/live/stream.flv", true),
            ("https://a.example.com/app.js", false),
            ("https://a.example.com/index.html", false),
            ("https://a.example.com/api/room?id=1", false),
        ];
        for (url, expected) in cases {
            assert_eq!(scheduler.should_download(url), expected, "{url}");
        }
        assert!(scheduler.attempted().is_empty());
    }

    #[test]
    fn should_download_rejects_attempted_urls() {
        let scheduler = offline_scheduler();
        let urls = [
            "https://cdn.example.com/live/room.m3u8",
            "https://cdn.example.com/live/seg_1.ts",
            "https://cdn.example.com/live/chunk.m4s",
            "https://cdn.example.com/vod/clip.mp4",
            "https://cdn.example.com/live/stream.flv",
            "https://a.example.com/app.js",
        ];
        for url in urls {
            assert!(scheduler.attempted().claim(url).is_some());
        }
        for url in urls {
            assert!(!scheduler.should_download(url), "{url}");
        }
        assert_eq!(scheduler.attempted().len(), urls.len());
    }

    #[test]
    fn inspects_media_playlists() {
        let body = b"#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXTINF:4.0,\nseg_1.ts?auth=1\n#EXTINF:4.0,\nseg_2.ts\n#EXT-X-ENDLIST\n";
        match inspect_manifest(body) {
            ManifestReport::Media { segments } => {
                assert_eq!(segments, vec!["seg_1.ts?auth=1", "seg_2.ts"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn inspects_master_playlists() {
        let body = b"#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\nhd.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=640000\nsd.m3u8\n";
        assert_eq!(
            inspect_manifest(body),
            ManifestReport::Master { variants: 2 }
        );
    }

    #[test]
    fn rejects_non_manifests() {
        assert_eq!(inspect_manifest(b"<html></html>"), ManifestReport::MissingHeader);
        assert_eq!(inspect_manifest(&[0xff, 0xfe, 0x00]), ManifestReport::NotUtf8);
    }
}
