//! Traits and types for the media fetch adapter

use async_trait::async_trait;
use std::path::PathBuf;

use crate::format::FormatSelection;
use crate::types::{MediaMetadata, SearchResult};

/// Which stage a raw progress sample belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchPhase {
    /// Bytes are still arriving
    Downloading,
    /// The transfer finished; merging or transcoding may follow
    Finished,
}

/// One raw progress sample as reported by the extraction tool
#[derive(Clone, Debug, PartialEq)]
pub struct FetchProgress {
    /// Stage of the fetch
    pub phase: FetchPhase,
    /// Bytes received so far
    pub downloaded_bytes: u64,
    /// Total size, if the tool knows or estimates it
    pub total_bytes: Option<u64>,
    /// Current speed in bytes per second
    pub speed_bps: Option<f64>,
    /// Seconds remaining
    pub eta_secs: Option<u64>,
}

/// What the fetcher should do after delivering a progress sample
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookAction {
    /// Keep going
    Continue,
    /// Stop the fetch as soon as possible and return [`FetchError::Aborted`](crate::error::FetchError::Aborted)
    Abort,
}

/// Receiver of raw progress samples during [`MediaFetcher::download`]
///
/// The fetcher awaits each call before reading further output, so a hook that
/// does not return (for example while paused) holds the fetch at that point.
#[async_trait]
pub trait ProgressHook: Send + Sync {
    /// Handle one sample and decide whether the fetch continues
    async fn on_progress(&self, progress: FetchProgress) -> HookAction;
}

/// Everything a fetcher needs to retrieve one item
#[derive(Clone, Debug)]
pub struct DownloadRequest {
    /// Page URL
    pub url: String,
    /// Stream selector and optional audio transcode
    pub selection: FormatSelection,
    /// Output path containing the `%(ext)s` placeholder
    pub output_template: PathBuf,
}

/// Capabilities of a fetcher implementation
#[derive(Debug, Clone, Copy)]
pub struct FetcherCapabilities {
    /// Can resolve metadata and download
    pub can_download: bool,
    /// Can search for media by text
    pub can_search: bool,
    /// An encoder is available for stream merging and audio extraction
    pub can_transcode: bool,
}

/// Trait for the external media extraction service
///
/// Implementations resolve URLs to metadata and retrieve media. Errors are
/// ordinary [`crate::Error`] values; the download worker turns them into the
/// item's failure message, so they never escape to the queue.
///
/// # Examples
///
/// ```no_run
/// use media_dl::fetcher::{MediaFetcher, YtDlpFetcher};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = YtDlpFetcher::from_path(Default::default())
///     .expect("yt-dlp not found in PATH");
///
/// let meta = fetcher.fetch_metadata("https://youtu.be/dQw4w9WgXcQ").await?;
/// println!("{} by {}", meta.title, meta.uploader);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Resolve a URL to its metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be launched, rejects the URL, or
    /// prints output that cannot be parsed.
    async fn fetch_metadata(&self, url: &str) -> crate::Result<MediaMetadata>;

    /// Retrieve media, reporting progress through `hook`
    ///
    /// Returns the output path if the tool reported one. The caller resolves
    /// the final file itself when it did not.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Aborted`](crate::error::FetchError::Aborted) when
    /// the hook asked to stop, or any other error when the fetch failed.
    async fn download(
        &self,
        request: &DownloadRequest,
        hook: &dyn ProgressHook,
    ) -> crate::Result<Option<PathBuf>>;

    /// Search for media by free text, returning at most `limit` hits
    async fn search(&self, query: &str, limit: usize) -> crate::Result<Vec<SearchResult>>;

    /// Query capabilities of this fetcher
    fn capabilities(&self) -> FetcherCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
