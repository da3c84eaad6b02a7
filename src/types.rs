//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Unique identifier for a queue item
///
/// Assigned at admission time and stable for the item's lifetime. Identifiers are
/// never reused within one [`MediaDownloader`](crate::MediaDownloader).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ItemId> for u64 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Lifecycle state of a queue item
///
/// `Queued -> Downloading -> {Paused <-> Downloading} -> Completed | Cancelled | Failed`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Admitted and waiting for `start`
    Queued,
    /// A worker is bound and the fetch is running
    Downloading,
    /// A worker is bound but progress is suppressed
    Paused,
    /// Output file resolved
    Completed,
    /// Cancelled by the caller
    Cancelled,
    /// Fetch or output resolution failed
    Failed,
}

impl Status {
    /// Terminal states accept no further transitions except eviction
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled | Status::Failed)
    }

    /// States in which exactly one worker is bound to the item
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Downloading | Status::Paused)
    }

    /// States from which `start` spawns a worker (`Failed` allows retry in place)
    pub fn can_start(&self) -> bool {
        matches!(self, Status::Queued | Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::Downloading => "downloading",
            Status::Paused => "paused",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What kind of media the caller wants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Video with audio, merged into mp4 when an encoder is available
    Video,
    /// Audio transcoded to mp3
    AudioStandard,
    /// Audio transcoded to m4a
    AudioHighQuality,
}

impl MediaKind {
    /// Whether this kind extracts audio only
    pub fn is_audio(&self) -> bool {
        !matches!(self, MediaKind::Video)
    }

    /// Short label used in status text
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Video => "Video",
            MediaKind::AudioStandard => "Audio MP3",
            MediaKind::AudioHighQuality => "Audio HQ",
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "video" => Ok(MediaKind::Video),
            "audio_standard" | "audio" => Ok(MediaKind::AudioStandard),
            "audio_high_quality" | "audio_hq" => Ok(MediaKind::AudioHighQuality),
            other => Err(Error::InvalidInput(format!("unknown media kind '{other}'"))),
        }
    }
}

/// Closed set of quality tiers
///
/// Video kinds use `Best` and the height tiers; audio kinds use `Best`,
/// `High`, `Medium` and `Low`. Mixing them is rejected by [`FormatRequest::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    /// Best available
    #[serde(rename = "best")]
    Best,
    /// At most 1080 lines
    #[serde(rename = "1080p")]
    P1080,
    /// At most 720 lines
    #[serde(rename = "720p")]
    P720,
    /// At most 480 lines
    #[serde(rename = "480p")]
    P480,
    /// At most 360 lines
    #[serde(rename = "360p")]
    P360,
    /// At most 240 lines
    #[serde(rename = "240p")]
    P240,
    /// At most 144 lines
    #[serde(rename = "144p")]
    P144,
    /// 256 kbps audio
    #[serde(rename = "high")]
    High,
    /// 192 kbps audio
    #[serde(rename = "medium")]
    Medium,
    /// 128 kbps audio
    #[serde(rename = "low")]
    Low,
}

impl Quality {
    /// Every tier, in display order
    pub const ALL: [Quality; 10] = [
        Quality::Best,
        Quality::P1080,
        Quality::P720,
        Quality::P480,
        Quality::P360,
        Quality::P240,
        Quality::P144,
        Quality::High,
        Quality::Medium,
        Quality::Low,
    ];

    /// Height bound for video tiers (`None` for `Best` and audio tiers)
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
            Quality::P240 => Some(240),
            Quality::P144 => Some(144),
            Quality::Best | Quality::High | Quality::Medium | Quality::Low => None,
        }
    }

    /// Transcode bitrate for audio tiers (`None` for height tiers)
    pub fn audio_bitrate_kbps(&self) -> Option<u32> {
        match self {
            Quality::Best => Some(320),
            Quality::High => Some(256),
            Quality::Medium => Some(192),
            Quality::Low => Some(128),
            _ => None,
        }
    }

    /// Whether the tier is valid for the given kind
    pub fn applies_to(&self, kind: MediaKind) -> bool {
        if kind.is_audio() {
            self.audio_bitrate_kbps().is_some()
        } else {
            *self == Quality::Best || self.max_height().is_some()
        }
    }

    /// The wire name (`"best"`, `"720p"`, `"low"`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::P240 => "240p",
            Quality::P144 => "144p",
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Quality::ALL
            .iter()
            .copied()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown quality '{s}'")))
    }
}

/// A validated (kind, quality) pair
///
/// Only combinations present in the format-selector table can be constructed,
/// so the worker never has to fall back on an unknown selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFormatRequest")]
pub struct FormatRequest {
    kind: MediaKind,
    quality: Quality,
}

#[derive(Deserialize)]
struct RawFormatRequest {
    kind: MediaKind,
    quality: Quality,
}

impl TryFrom<RawFormatRequest> for FormatRequest {
    type Error = Error;

    fn try_from(raw: RawFormatRequest) -> Result<Self> {
        FormatRequest::new(raw.kind, raw.quality)
    }
}

impl FormatRequest {
    /// Validate a kind/quality combination
    pub fn new(kind: MediaKind, quality: Quality) -> Result<Self> {
        if !quality.applies_to(kind) {
            return Err(Error::InvalidInput(format!(
                "quality '{}' is not available for {}",
                quality,
                kind.label()
            )));
        }
        Ok(Self { kind, quality })
    }

    /// Requested media kind
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Requested quality tier
    pub fn quality(&self) -> Quality {
        self.quality
    }
}

/// Metadata resolved once at admission time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Extractor-specific media id
    pub id: String,
    /// Media title
    pub title: String,
    /// Channel / uploader name
    pub uploader: String,
    /// Duration in seconds, if known
    pub duration_secs: Option<u64>,
    /// Thumbnail URL, if any
    pub thumbnail_url: Option<String>,
    /// Container extension the extractor would pick by default
    pub ext: String,
}

/// Source URL plus its cached metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Page URL handed to the fetcher
    pub url: String,
    /// Metadata captured at admission
    pub metadata: MediaMetadata,
}

impl SourceDescriptor {
    /// Pair a URL with its metadata
    pub fn new(url: impl Into<String>, metadata: MediaMetadata) -> Self {
        Self {
            url: url.into(),
            metadata,
        }
    }

    /// Media title
    pub fn title(&self) -> &str {
        &self.metadata.title
    }
}

/// One unit of work in the queue
///
/// Snapshots handed out by the downloader are copies; mutating them has no
/// effect on the queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueItem {
    /// Stable identifier
    pub id: ItemId,
    /// What to fetch
    pub source: SourceDescriptor,
    /// How to fetch it
    pub request: FormatRequest,
    /// Where the output goes (validated at start time)
    pub destination_dir: PathBuf,
    /// Current lifecycle state
    pub status: Status,
    /// Progress in [0, 100]; never decreases while downloading
    pub progress_percent: f32,
    /// Last reported transfer speed
    pub speed_bps: Option<u64>,
    /// Last reported time remaining
    pub eta_secs: Option<u64>,
    /// Human-readable status line
    pub status_text: String,
    /// Error captured on the transition into `Failed`
    pub last_error: Option<String>,
    /// Number of times a worker has been spawned for this item
    pub attempts: u32,
    /// Admission time
    pub created_at: DateTime<Utc>,
    resolved_output_path: Option<PathBuf>,
}

impl QueueItem {
    pub(crate) fn new(
        id: ItemId,
        source: SourceDescriptor,
        request: FormatRequest,
        destination_dir: PathBuf,
    ) -> Self {
        Self {
            id,
            source,
            request,
            destination_dir,
            status: Status::Queued,
            progress_percent: 0.0,
            speed_bps: None,
            eta_secs: None,
            status_text: "Queued".to_string(),
            last_error: None,
            attempts: 0,
            created_at: Utc::now(),
            resolved_output_path: None,
        }
    }

    /// Final output file, available only once the item is `Completed`
    pub fn output_path(&self) -> Option<&Path> {
        match self.status {
            Status::Completed => self.resolved_output_path.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn set_output_path(&mut self, path: PathBuf) {
        self.resolved_output_path = Some(path);
    }
}

/// Event emitted during the item lifecycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Item admitted to the queue
    Queued {
        /// Item ID
        id: ItemId,
        /// Media title
        title: String,
    },

    /// Worker spawned
    Started {
        /// Item ID
        id: ItemId,
    },

    /// Coalesced progress update
    Progress {
        /// Item ID
        id: ItemId,
        /// Percentage (absent while the total size is unknown)
        #[serde(skip_serializing_if = "Option::is_none")]
        percent: Option<f32>,
        /// Current speed in bytes per second
        #[serde(skip_serializing_if = "Option::is_none")]
        speed_bps: Option<u64>,
        /// Seconds remaining
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_secs: Option<u64>,
        /// Human-readable status line
        status: String,
    },

    /// Item paused
    Paused {
        /// Item ID
        id: ItemId,
    },

    /// Item resumed
    Resumed {
        /// Item ID
        id: ItemId,
    },

    /// Transfer finished, post-processing (merge/transcode) underway
    Processing {
        /// Item ID
        id: ItemId,
    },

    /// Item completed
    Completed {
        /// Item ID
        id: ItemId,
        /// Resolved output file
        path: PathBuf,
    },

    /// Item failed
    Failed {
        /// Item ID
        id: ItemId,
        /// Error message
        error: String,
    },

    /// Item cancelled
    Cancelled {
        /// Item ID
        id: ItemId,
    },

    /// Item evicted from the queue
    Removed {
        /// Item ID
        id: ItemId,
    },

    /// Downloader shut down
    Shutdown,
}

/// Per-status counts over the queue
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Total number of items in the queue
    pub total: usize,
    /// Waiting for `start`
    pub queued: usize,
    /// Actively downloading
    pub downloading: usize,
    /// Paused
    pub paused: usize,
    /// Completed
    pub completed: usize,
    /// Cancelled
    pub cancelled: usize,
    /// Failed
    pub failed: usize,
}

/// What the configured fetcher can do
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Fetcher implementation name
    pub fetcher: String,
    /// Whether an encoder is available for merging and audio transcoding
    pub can_transcode: bool,
    /// Whether the fetcher can search
    pub can_search: bool,
}

/// One search hit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Media title
    pub title: String,
    /// Channel name
    pub channel: String,
    /// Duration in seconds, if known
    pub duration_secs: Option<u64>,
    /// Thumbnail URL, if any
    pub thumbnail_url: Option<String>,
    /// Page URL to pass to `add_url`
    pub url: String,
}
