//! # media-dl
//!
//! Download queue and progress-tracking engine for online media.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Single-writer** - Workers report through a channel; only the coordinator
//!   mutates queue state
//! - **Tool-agnostic** - Extraction goes through the [`MediaFetcher`] trait;
//!   the bundled implementation drives the `yt-dlp` binary
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, FormatRequest, MediaDownloader, MediaKind, Quality};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = FormatRequest::new(MediaKind::Video, Quality::P720)?;
//!     let id = downloader
//!         .add_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ", request, "downloads")
//!         .await?;
//!     downloader.start(id).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Queue coordinator and download workers (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Media fetch adapter (yt-dlp)
pub mod fetcher;
/// Format-selector table
pub mod format;
/// Progress coalescing and formatting
pub mod progress;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, FetchConfig, ToolsConfig};
pub use downloader::{DEFAULT_SEARCH_LIMIT, MediaDownloader};
pub use error::{DownloadError, Error, FetchError, Result};
pub use fetcher::{MediaFetcher, NoOpFetcher, YtDlpFetcher};
pub use format::{AudioCodec, AudioTranscode, FormatSelection};
pub use types::{
    Capabilities, Event, FormatRequest, ItemId, MediaKind, MediaMetadata, Quality, QueueItem,
    QueueStats, SearchResult, SourceDescriptor, Status,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm = signal(SignalKind::terminate());
    let sigint = signal(SignalKind::interrupt());

    match (sigterm, sigint) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down queue"),
                _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down queue"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM, shutting down queue");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT, shutting down queue");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down queue"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
