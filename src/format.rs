//! Format-selector table
//!
//! Maps a validated [`FormatRequest`] to the stream selector and optional audio
//! transcode handed to the fetcher. The table is closed: every constructible
//! request has exactly one row, with a second, simpler row used when no encoder
//! is available to merge streams or transcode audio.

use serde::{Deserialize, Serialize};

use crate::types::{FormatRequest, MediaKind, Quality};

/// Height used for `best` when no encoder is available to merge streams
const FALLBACK_BEST_HEIGHT: u32 = 1080;

/// Selector used for every audio kind
const AUDIO_SELECTOR: &str = "bestaudio/best";

/// Lossy/compact audio container produced by a transcode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MPEG layer 3
    Mp3,
    /// AAC in an MP4 audio container
    M4a,
}

impl AudioCodec {
    /// Codec name as understood by the extraction tool, also the file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::M4a => "m4a",
        }
    }
}

/// Post-download audio extraction settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTranscode {
    /// Target codec
    pub codec: AudioCodec,
    /// Target bitrate in kbps
    pub bitrate_kbps: u32,
}

/// What the fetcher should retrieve for one request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSelection {
    /// Stream selector string
    pub selector: String,
    /// Audio extraction, if the request is an audio kind and an encoder exists
    pub transcode: Option<AudioTranscode>,
}

impl FormatSelection {
    /// Extension the output is most likely to have after post-processing
    ///
    /// Used as the first probe when resolving the output file. `None` means the
    /// container is decided by whichever stream the tool picked.
    pub fn expected_extension(&self) -> Option<&'static str> {
        match self.transcode {
            Some(t) => Some(t.codec.as_str()),
            None if self.selector.contains("[ext=mp4]") => Some("mp4"),
            None => None,
        }
    }
}

/// Look up the selector for a request
///
/// `encoder_available` selects between the full row (merge best video with
/// m4a audio, transcode audio kinds) and the fallback row (single
/// height-bounded stream, untouched best audio).
pub fn select(request: FormatRequest, encoder_available: bool) -> FormatSelection {
    match request.kind() {
        MediaKind::Video if encoder_available => FormatSelection {
            selector: video_selector(request.quality().max_height()),
            transcode: None,
        },
        MediaKind::Video => FormatSelection {
            selector: format!(
                "best[height<={}]",
                request
                    .quality()
                    .max_height()
                    .unwrap_or(FALLBACK_BEST_HEIGHT)
            ),
            transcode: None,
        },
        MediaKind::AudioStandard | MediaKind::AudioHighQuality => FormatSelection {
            selector: AUDIO_SELECTOR.to_string(),
            transcode: encoder_available.then(|| AudioTranscode {
                codec: audio_codec(request.kind()),
                bitrate_kbps: audio_bitrate(request.quality()),
            }),
        },
    }
}

fn video_selector(max_height: Option<u32>) -> String {
    match max_height {
        Some(h) => format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best"
        ),
        None => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
    }
}

fn audio_codec(kind: MediaKind) -> AudioCodec {
    match kind {
        MediaKind::AudioHighQuality => AudioCodec::M4a,
        _ => AudioCodec::Mp3,
    }
}

/// Bitrate tier; 192 kbps for anything outside the audio tiers
fn audio_bitrate(quality: Quality) -> u32 {
    quality.audio_bitrate_kbps().unwrap_or(192)
}
