//! Configuration types for media-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Queue and worker behavior (directories, concurrency, pacing)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default destination directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Cap on simultaneously running workers (None = unbounded)
    ///
    /// Each started item gets its own task. With a cap, workers beyond the limit
    /// wait for a permit while their item already reports `Downloading`.
    #[serde(default)]
    pub max_concurrent_downloads: Option<usize>,

    /// How often a paused worker re-checks its pause and cancel flags (default: 500ms)
    #[serde(default = "default_pause_poll_interval", with = "millis_serde")]
    pub pause_poll_interval: Duration,

    /// Minimum spacing between forwarded progress updates per item (default: 250ms)
    #[serde(default = "default_progress_interval", with = "millis_serde")]
    pub progress_interval: Duration,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How long `shutdown` waits for workers to drain (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: None,
            pause_poll_interval: default_pause_poll_interval(),
            progress_interval: default_progress_interval(),
            event_buffer: default_event_buffer(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// External tool paths (yt-dlp, ffmpeg)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Options passed through to the extraction tool
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Socket timeout handed to the tool (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,

    /// Whole-request retries (default: 10)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-fragment retries for segmented streams (default: 10)
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,

    /// Extra arguments appended verbatim before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Hosts accepted by URL validation (a leading `www.` is ignored)
    #[serde(default = "default_supported_hosts")]
    pub supported_hosts: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            socket_timeout: default_socket_timeout(),
            retries: default_retries(),
            fragment_retries: default_retries(),
            extra_args: Vec::new(),
            supported_hosts: default_supported_hosts(),
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) - directories, concurrency, pacing
/// - [`tools`](ToolsConfig) - external binary paths
/// - [`fetch`](FetchConfig) - extraction tool options and URL policy
///
/// All sub-config fields are flattened, so the JSON/TOML format is a single
/// flat object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Queue and worker behavior
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Extraction tool options
    #[serde(flatten)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Default destination directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Reject settings that would stall or disable the queue
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == Some(0) {
            return Err(config_error(
                "max_concurrent_downloads must be at least 1 (omit it for no limit)",
                "max_concurrent_downloads",
            ));
        }
        if self
            .download
            .max_concurrent_downloads
            .is_some_and(|n| n > tokio::sync::Semaphore::MAX_PERMITS)
        {
            return Err(config_error(
                "max_concurrent_downloads exceeds the maximum number of permits",
                "max_concurrent_downloads",
            ));
        }
        if self.download.pause_poll_interval.is_zero() {
            return Err(config_error(
                "pause_poll_interval must be greater than zero",
                "pause_poll_interval",
            ));
        }
        if self.download.progress_interval.is_zero() {
            return Err(config_error(
                "progress_interval must be greater than zero",
                "progress_interval",
            ));
        }
        if self.download.event_buffer == 0 {
            return Err(config_error(
                "event_buffer must be greater than zero",
                "event_buffer",
            ));
        }
        if self.fetch.supported_hosts.is_empty() {
            return Err(config_error(
                "supported_hosts must list at least one host",
                "supported_hosts",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_pause_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_event_buffer() -> usize {
    1000
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retries() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_supported_hosts() -> Vec<String> {
    [
        "youtube.com",
        "youtu.be",
        "vimeo.com",
        "dailymotion.com",
        "twitch.tv",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
