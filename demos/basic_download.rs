//! Basic download example
//!
//! This example demonstrates the core functionality of media-dl:
//! - Creating a downloader instance (yt-dlp and ffmpeg are located on PATH)
//! - Subscribing to events
//! - Adding a URL to the queue and starting it
//! - Monitoring download progress
//!
//! Usage: `cargo run --example basic_download -- <url> [video|audio]`

use media_dl::config::{Config, DownloadConfig};
use media_dl::{Event, FormatRequest, MediaDownloader, MediaKind, Quality, run_with_shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string());
    let request = match args.next().as_deref() {
        Some("audio") => FormatRequest::new(MediaKind::AudioStandard, Quality::Medium)?,
        _ => FormatRequest::new(MediaKind::Video, Quality::P720)?,
    };

    // Build configuration
    let config = Config {
        download: DownloadConfig {
            download_dir: "downloads".into(),
            max_concurrent_downloads: Some(2),
            ..Default::default()
        },
        ..Default::default()
    };

    // Create downloader instance
    let downloader = MediaDownloader::new(config).await?;
    let caps = downloader.capabilities();
    println!(
        "Fetcher: {} (transcode: {}, search: {})",
        caps.fetcher, caps.can_transcode, caps.can_search
    );

    // Subscribe to events
    let mut events = downloader.subscribe();
    let monitor = downloader.clone();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Queued { id, title } => {
                    println!("✓ Queued #{}: {}", id, title);
                }
                Event::Progress { id, status, .. } => {
                    println!("⬇ #{}: {}", id, status);
                }
                Event::Processing { id } => {
                    println!("⚙ #{}: post-processing", id);
                }
                Event::Completed { id, path } => {
                    println!("✓ Complete #{}: {:?}", id, path);
                    let stats = monitor.stats().await;
                    println!("  {} of {} items done", stats.completed, stats.total);
                }
                Event::Failed { id, error } => {
                    println!("✗ Failed #{}: {}", id, error);
                }
                Event::Shutdown => {
                    println!("Shutting down");
                    break;
                }
                _ => {}
            }
        }
    });

    // Add the URL and start it
    let id = downloader.add_url(&url, request, "downloads").await?;
    downloader.start(id).await?;

    println!("Press Ctrl+C to stop");
    run_with_shutdown(downloader).await?;

    Ok(())
}
