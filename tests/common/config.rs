//! Test configuration helpers for creating downloaders around a scripted fetcher

use super::fixtures::ScriptedFetcher;
use media_dl::{Config, MediaDownloader};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Delay between scripted progress steps
pub const STEP_DELAY: Duration = Duration::from_millis(20);

/// Configuration rooted in a fresh temp dir with fast polling
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.pause_poll_interval = Duration::from_millis(10);
    config.download.progress_interval = Duration::from_millis(1);
    config.download.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Create a downloader with the given config and a fresh scripted fetcher
pub async fn create_downloader_with_config(
    config: Config,
    temp_dir: TempDir,
) -> (MediaDownloader, Arc<ScriptedFetcher>, TempDir) {
    std::fs::create_dir_all(&config.download.download_dir).unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(STEP_DELAY));
    let downloader = MediaDownloader::with_fetcher(config, fetcher.clone()).unwrap();
    (downloader, fetcher, temp_dir)
}

/// Create a downloader with default test settings
///
/// The returned [`TempDir`] must be kept alive for the duration of the test.
pub async fn create_downloader() -> (MediaDownloader, Arc<ScriptedFetcher>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    create_downloader_with_config(config, temp_dir).await
}
