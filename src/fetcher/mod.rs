//! Media fetch adapter
//!
//! This module provides a trait-based boundary around the external media
//! extraction service. The downloader only talks to [`MediaFetcher`]; byte-level
//! retrieval, stream merging and audio transcoding all happen behind it.
//!
//! ## Architecture
//!
//! - [`YtDlpFetcher`]: runs the external `yt-dlp` binary, with ffmpeg when available
//! - [`NoOpFetcher`]: stub used when no extraction tool is installed
//!
//! Progress flows back through a [`ProgressHook`], which can also ask the fetch
//! to stop by returning [`HookAction::Abort`].
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::config::FetchConfig;
//! use media_dl::fetcher::{MediaFetcher, YtDlpFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = YtDlpFetcher::from_path(FetchConfig::default())
//!         .expect("yt-dlp binary not found");
//!
//!     for hit in fetcher.search("rust async", 5).await? {
//!         println!("{} - {}", hit.title, hit.url);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod noop;
mod parser;
mod traits;
mod ytdlp;

pub use noop::NoOpFetcher;
pub use traits::{
    DownloadRequest, FetchPhase, FetchProgress, FetcherCapabilities, HookAction, MediaFetcher,
    ProgressHook,
};
pub use ytdlp::YtDlpFetcher;
