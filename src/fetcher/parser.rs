//! Parser for yt-dlp output
//!
//! Progress and the final file path are requested through templates with fixed
//! prefixes so they can be told apart from anything else the tool prints.

use serde::Deserialize;
use std::path::PathBuf;

use super::traits::{FetchPhase, FetchProgress};
use crate::error::FetchError;
use crate::types::{MediaMetadata, SearchResult};

/// Prefix of lines produced by [`PROGRESS_TEMPLATE`]
pub(crate) const PROGRESS_PREFIX: &str = "media-dl-progress ";

/// Prefix of the line produced by [`OUTPUT_TEMPLATE`]
pub(crate) const OUTPUT_PREFIX: &str = "media-dl-output ";

/// `--progress-template` value: status|downloaded|total|estimate|speed|eta
pub(crate) const PROGRESS_TEMPLATE: &str = "download:media-dl-progress %(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";

/// `--print` value reporting the file left after post-processing
pub(crate) const OUTPUT_TEMPLATE: &str = "after_move:media-dl-output %(filepath)s";

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_UPLOADER: &str = "Unknown Uploader";
const UNKNOWN_CHANNEL: &str = "Unknown Channel";
const DEFAULT_EXT: &str = "mp4";

/// One classified line of tool stdout
#[derive(Debug, PartialEq)]
pub(crate) enum ToolLine {
    /// A progress sample
    Progress(FetchProgress),
    /// The final output path
    Output(PathBuf),
    /// Anything else
    Other,
}

/// Classify one stdout line
pub(crate) fn parse_line(line: &str) -> ToolLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        return parse_progress(rest).map_or(ToolLine::Other, ToolLine::Progress);
    }
    if let Some(path) = line.strip_prefix(OUTPUT_PREFIX)
        && !path.trim().is_empty()
    {
        return ToolLine::Output(PathBuf::from(path.trim()));
    }
    ToolLine::Other
}

fn parse_progress(fields: &str) -> Option<FetchProgress> {
    let mut parts = fields.split('|');
    let phase = match parts.next()?.trim() {
        "downloading" => FetchPhase::Downloading,
        "finished" => FetchPhase::Finished,
        _ => return None,
    };
    let downloaded = number(parts.next()?);
    let total = number(parts.next()?);
    let estimate = number(parts.next()?);
    let speed = number(parts.next()?);
    let eta = number(parts.next()?);

    Some(FetchProgress {
        phase,
        downloaded_bytes: downloaded.map_or(0, |v| v as u64),
        total_bytes: total
            .or(estimate)
            .filter(|t| *t > 0.0)
            .map(|t| t as u64),
        speed_bps: speed,
        eta_secs: eta.filter(|e| *e >= 0.0).map(|e| e as u64),
    })
}

/// Numeric template field; yt-dlp prints `NA` (or `None`) for missing values
fn number(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[derive(Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    ext: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
}

#[derive(Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

#[derive(Deserialize)]
struct RawPlaylist {
    #[serde(default)]
    entries: Vec<RawInfo>,
}

impl RawInfo {
    fn thumbnail_url(&self) -> Option<String> {
        self.thumbnail
            .clone()
            .or_else(|| self.thumbnails.iter().find_map(|t| t.url.clone()))
            .filter(|u| !u.is_empty())
    }

    fn duration_secs(&self) -> Option<u64> {
        self.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parse `yt-dlp -J` output for a single video
pub(crate) fn parse_metadata(json: &[u8]) -> Result<MediaMetadata, FetchError> {
    let raw: RawInfo = serde_json::from_slice(json)
        .map_err(|e| FetchError::Parse(format!("invalid metadata JSON: {e}")))?;

    let thumbnail_url = raw.thumbnail_url();
    let duration_secs = raw.duration_secs();
    Ok(MediaMetadata {
        id: raw.id.unwrap_or_default(),
        title: non_empty(raw.title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
        uploader: non_empty(raw.uploader)
            .or_else(|| non_empty(raw.channel))
            .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string()),
        duration_secs,
        thumbnail_url,
        ext: non_empty(raw.ext).unwrap_or_else(|| DEFAULT_EXT.to_string()),
    })
}

/// Parse `yt-dlp -J --flat-playlist ytsearchN:...` output
pub(crate) fn parse_search_results(json: &[u8]) -> Result<Vec<SearchResult>, FetchError> {
    let playlist: RawPlaylist = serde_json::from_slice(json)
        .map_err(|e| FetchError::Parse(format!("invalid search JSON: {e}")))?;

    Ok(playlist
        .entries
        .into_iter()
        .filter_map(|entry| {
            let thumbnail_url = entry.thumbnail_url();
            let duration_secs = entry.duration_secs();
            let url = non_empty(entry.webpage_url)
                .or_else(|| non_empty(entry.url))
                .or_else(|| {
                    non_empty(entry.id).map(|id| format!("https://www.youtube.com/watch?v={id}"))
                })?;
            Some(SearchResult {
                title: non_empty(entry.title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                channel: non_empty(entry.channel)
                    .or_else(|| non_empty(entry.uploader))
                    .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string()),
                duration_secs,
                thumbnail_url,
                url,
            })
        })
        .collect())
}
