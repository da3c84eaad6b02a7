//! Shared test helpers for creating MediaDownloader instances in tests.

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::error::{FetchError, Result};
use crate::fetcher::{
    DownloadRequest, FetchPhase, FetchProgress, FetcherCapabilities, HookAction, MediaFetcher,
    ProgressHook,
};
use crate::types::{
    FormatRequest, ItemId, MediaKind, MediaMetadata, Quality, SearchResult, SourceDescriptor,
    Status,
};
use crate::utils::EXT_PLACEHOLDER;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

/// How a [`MockFetcher`] behaves when asked to download
#[derive(Clone, Debug)]
pub(crate) enum MockMode {
    /// Feed the samples to the hook, write `<template>.<ext>` and succeed
    Complete { samples: Vec<FetchProgress>, ext: String },
    /// Fail immediately with the given message
    Fail(String),
    /// Send heartbeats until released (then complete like `Complete`) or aborted
    Hold { ext: String },
    /// Succeed without writing any file
    NoOutput,
}

/// Scriptable fetcher that never touches the network
pub(crate) struct MockFetcher {
    mode: Mutex<MockMode>,
    pub(crate) release: AtomicBool,
    pub(crate) calls: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) can_transcode: bool,
    pub(crate) requests: Mutex<Vec<DownloadRequest>>,
}

impl MockFetcher {
    pub(crate) fn new(mode: MockMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            release: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            can_transcode: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn completing(samples: Vec<FetchProgress>) -> Self {
        Self::new(MockMode::Complete {
            samples,
            ext: "mp4".to_string(),
        })
    }

    pub(crate) fn holding() -> Self {
        Self::new(MockMode::Hold {
            ext: "mp4".to_string(),
        })
    }

    pub(crate) fn set_mode(&self, mode: MockMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub(crate) fn release(&self) {
        self.release.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Expand the template the way yt-dlp does: fill the extension, unescape `%%`
    fn write_output(request: &DownloadRequest, ext: &str) -> Result<PathBuf> {
        let template = request.output_template.to_string_lossy();
        let stem = template.strip_suffix(EXT_PLACEHOLDER).unwrap_or(&template);
        let path = PathBuf::from(format!("{}{ext}", stem.replace("%%", "%")));
        std::fs::write(&path, b"media")?;
        Ok(path)
    }

    async fn complete(
        request: &DownloadRequest,
        hook: &dyn ProgressHook,
        samples: Vec<FetchProgress>,
        ext: &str,
    ) -> Result<Option<PathBuf>> {
        for sample in samples {
            if hook.on_progress(sample).await == HookAction::Abort {
                return Err(FetchError::Aborted.into());
            }
        }
        if hook.on_progress(finished()).await == HookAction::Abort {
            return Err(FetchError::Aborted.into());
        }
        Self::write_output(request, ext)?;
        // Path left unreported so the worker exercises output resolution
        Ok(None)
    }
}

/// Decrements the in-flight counter when a mock download returns
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata> {
        Ok(MediaMetadata {
            title: format!("Title for {url}"),
            ..sample_metadata()
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        hook: &dyn ProgressHook,
    ) -> Result<Option<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let mode = self.mode.lock().unwrap().clone();
        match mode {
            MockMode::Complete { samples, ext } => {
                Self::complete(request, hook, samples, &ext).await
            }
            MockMode::Fail(message) => Err(FetchError::Exited {
                tool: "mock".to_string(),
                code: Some(1),
                stderr: message,
            }
            .into()),
            MockMode::NoOutput => Ok(None),
            MockMode::Hold { ext } => {
                while !self.release.load(Ordering::SeqCst) {
                    if hook.on_progress(heartbeat()).await == HookAction::Abort {
                        return Err(FetchError::Aborted.into());
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Self::complete(request, hook, Vec::new(), &ext).await
            }
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        Ok((0..limit.min(3))
            .map(|i| SearchResult {
                title: format!("{query} #{i}"),
                channel: "Channel".to_string(),
                duration_secs: Some(60),
                thumbnail_url: None,
                url: format!("https://www.youtube.com/watch?v=result{i}"),
            })
            .collect())
    }

    fn capabilities(&self) -> FetcherCapabilities {
        FetcherCapabilities {
            can_download: true,
            can_search: true,
            can_transcode: self.can_transcode,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A downloading sample with known total
pub(crate) fn sample(downloaded: u64, total: u64) -> FetchProgress {
    FetchProgress {
        phase: FetchPhase::Downloading,
        downloaded_bytes: downloaded,
        total_bytes: Some(total),
        speed_bps: Some(1024.0),
        eta_secs: Some(1),
    }
}

fn heartbeat() -> FetchProgress {
    FetchProgress {
        phase: FetchPhase::Downloading,
        downloaded_bytes: 0,
        total_bytes: None,
        speed_bps: None,
        eta_secs: None,
    }
}

fn finished() -> FetchProgress {
    FetchProgress {
        phase: FetchPhase::Finished,
        downloaded_bytes: 0,
        total_bytes: None,
        speed_bps: None,
        eta_secs: None,
    }
}

pub(crate) fn sample_metadata() -> MediaMetadata {
    MediaMetadata {
        id: "abc123".to_string(),
        title: "Test Video".to_string(),
        uploader: "Uploader".to_string(),
        duration_secs: Some(60),
        thumbnail_url: None,
        ext: "mp4".to_string(),
    }
}

pub(crate) fn sample_source() -> SourceDescriptor {
    SourceDescriptor::new("https://www.youtube.com/watch?v=abc123", sample_metadata())
}

pub(crate) fn video_request() -> FormatRequest {
    FormatRequest::new(MediaKind::Video, Quality::P720).unwrap()
}

/// Config with short intervals so tests run quickly
pub(crate) fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.pause_poll_interval = Duration::from_millis(10);
    // Only the first and 100% samples get through, so heartbeats cannot race assertions
    config.download.progress_interval = Duration::from_secs(3600);
    config.download.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Helper to create a test MediaDownloader backed by a holding [`MockFetcher`].
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader() -> (MediaDownloader, tempfile::TempDir) {
    let fetcher = Arc::new(MockFetcher::holding());
    create_test_downloader_with_fetcher(fetcher).await
}

/// Like [`create_test_downloader`] but with a caller-supplied fetcher
pub(crate) async fn create_test_downloader_with_fetcher(
    fetcher: Arc<MockFetcher>,
) -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(&temp_dir);
    create_test_downloader_with_config(config, fetcher, temp_dir).await
}

pub(crate) async fn create_test_downloader_with_config(
    config: Config,
    fetcher: Arc<MockFetcher>,
    temp_dir: tempfile::TempDir,
) -> (MediaDownloader, tempfile::TempDir) {
    std::fs::create_dir_all(&config.download.download_dir).unwrap();
    let downloader = MediaDownloader::with_fetcher(config, fetcher).unwrap();
    (downloader, temp_dir)
}

/// Admit the sample source into the downloader's default directory
pub(crate) async fn admit_sample(downloader: &MediaDownloader) -> ItemId {
    let dir = downloader.get_config().download.download_dir.clone();
    downloader
        .admit(sample_source(), video_request(), dir)
        .await
        .unwrap()
}

/// Start an item and wait until its worker's first sample has been applied
pub(crate) async fn start_settled(downloader: &MediaDownloader, id: ItemId) {
    assert!(downloader.start(id).await.unwrap());
    wait_until(|| async {
        downloader
            .item(id)
            .await
            .is_some_and(|item| item.status_text != "Starting")
    })
    .await;
}

/// Poll until the item reaches `status`, panicking after two seconds
pub(crate) async fn wait_for_status(downloader: &MediaDownloader, id: ItemId, status: Status) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if downloader.item(id).await.map(|item| item.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    let actual = downloader.item(id).await.map(|item| item.status);
    assert!(
        result.is_ok(),
        "item {id} did not reach {status}, currently {actual:?}"
    );
}

/// Poll until `predicate` holds, panicking after two seconds
pub(crate) async fn wait_until<F, Fut>(mut predicate: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !predicate().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within two seconds");
}
