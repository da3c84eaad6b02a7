//! No-op fetcher for graceful degradation

use super::traits::{DownloadRequest, FetcherCapabilities, MediaFetcher, ProgressHook};
use crate::types::{MediaMetadata, SearchResult};
use async_trait::async_trait;
use std::path::PathBuf;

const MISSING_TOOL: &str = "requires the external yt-dlp binary. \
     Configure ytdlp_path in config or ensure yt-dlp is in PATH.";

/// No-op fetcher used when no extraction tool is available
///
/// The downloader still accepts, lists and manages items; every operation
/// that needs the tool returns `Error::NotSupported`, and a started item moves
/// to `Failed` with that message.
///
/// # Examples
///
/// ```
/// use media_dl::fetcher::{MediaFetcher, NoOpFetcher};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = NoOpFetcher;
/// assert!(fetcher.fetch_metadata("https://youtu.be/abc").await.is_err());
/// assert!(!fetcher.capabilities().can_download);
/// # Ok(())
/// # }
/// ```
pub struct NoOpFetcher;

#[async_trait]
impl MediaFetcher for NoOpFetcher {
    async fn fetch_metadata(&self, _url: &str) -> crate::Result<MediaMetadata> {
        Err(crate::Error::NotSupported(format!(
            "metadata lookup {MISSING_TOOL}"
        )))
    }

    async fn download(
        &self,
        _request: &DownloadRequest,
        _hook: &dyn ProgressHook,
    ) -> crate::Result<Option<PathBuf>> {
        Err(crate::Error::NotSupported(format!("downloading {MISSING_TOOL}")))
    }

    async fn search(&self, _query: &str, _limit: usize) -> crate::Result<Vec<SearchResult>> {
        Err(crate::Error::NotSupported(format!("search {MISSING_TOOL}")))
    }

    fn capabilities(&self) -> FetcherCapabilities {
        FetcherCapabilities {
            can_download: false,
            can_search: false,
            can_transcode: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
