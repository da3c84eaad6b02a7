//! Utility functions for output naming and path resolution

use crate::error::{DownloadError, Error, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Characters that are illegal in file names on at least one supported filesystem
#[allow(clippy::expect_used)]
static ILLEGAL_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("static filename regex is valid"));

/// Placeholder the extraction tool replaces with the final container extension
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

/// Extensions probed, in order, when the tool does not report its output file
///
/// Remuxing and audio extraction can change the container after the template
/// was handed over, so the final file is located by looking for each of these.
pub const PROBE_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "m4a", "mp3", "opus", "ogg", "wav", "flac", "aac",
];

/// Distinguishes write probes from concurrent `start` calls
static PROBE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Name used when a title sanitizes down to nothing
const FALLBACK_NAME: &str = "download";

/// Make a media title safe to use as a file name
///
/// Spaces become underscores and characters illegal on common filesystems are
/// dropped.
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("What? A \"Title\""), "What_A_Title");
/// assert_eq!(sanitize_filename("a/b\\c"), "abc");
/// ```
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    let underscored = title.trim().replace(' ', "_");
    let cleaned: String = ILLEGAL_FILENAME_CHARS
        .replace_all(&underscored, "")
        .chars()
        .filter(|c| !c.is_control())
        .collect();

    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Output base name: sanitized title plus a local timestamp
///
/// The timestamp keeps repeated downloads of the same title from colliding.
#[must_use]
pub fn build_base_name(title: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}",
        sanitize_filename(title),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Template handed to the extraction tool (`<dir>/<base>.%(ext)s`)
///
/// `%` in the directory or base name is doubled so the tool writes it
/// literally; [`resolve_output_path`] still probes with the raw base.
#[must_use]
pub fn output_template(dir: &Path, base: &str) -> PathBuf {
    let dir = match dir.to_str() {
        Some(s) if s.contains('%') => PathBuf::from(escape_template(s)),
        _ => dir.to_path_buf(),
    };
    dir.join(format!("{}.{EXT_PLACEHOLDER}", escape_template(base)))
}

fn escape_template(text: &str) -> String {
    text.replace('%', "%%")
}

/// Locate the file a finished fetch actually produced
///
/// Resolution order:
/// 1. the path the fetcher reported, if it exists
/// 2. `<dir>/<base>.<expected_ext>`
/// 3. `<dir>/<base>.<ext>` for each of [`PROBE_EXTENSIONS`]
///
/// Returns `None` if no candidate exists on disk.
pub fn resolve_output_path(
    dir: &Path,
    base: &str,
    expected_ext: Option<&str>,
    reported: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = reported
        && path.is_file()
    {
        return Some(path.to_path_buf());
    }

    expected_ext
        .into_iter()
        .chain(PROBE_EXTENSIONS.iter().copied())
        .map(|ext| dir.join(format!("{base}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Validate a media page URL against a host allow-list
///
/// A missing scheme is treated as `https://`, a leading `www.` on the host is
/// ignored, and the URL must point somewhere below the host root.
///
/// # Examples
///
/// ```
/// use media_dl::utils::validate_media_url;
///
/// let hosts = vec!["youtube.com".to_string(), "youtu.be".to_string()];
/// assert!(validate_media_url("https://www.youtube.com/watch?v=abc", &hosts).is_ok());
/// assert!(validate_media_url("youtu.be/abc", &hosts).is_ok());
/// assert!(validate_media_url("https://example.com/video", &hosts).is_err());
/// ```
pub fn validate_media_url(url: &str, supported_hosts: &[String]) -> Result<url::Url> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::InvalidInput("URL is empty".to_string()));
    }

    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    let parsed = url::Url::parse(&candidate)
        .map_err(|e| Error::InvalidInput(format!("malformed URL '{url}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "unsupported URL scheme '{}'",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidInput(format!("URL '{url}' has no host")))?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if !supported_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
        return Err(Error::InvalidInput(format!("unsupported site '{host}'")));
    }

    if parsed.path() == "/" && parsed.query().is_none() {
        return Err(Error::InvalidInput(format!(
            "URL '{url}' does not point to any media"
        )));
    }

    Ok(parsed)
}

/// Check that a destination directory exists, is a directory and is writable
///
/// Writability is tested by creating and removing a probe file, since
/// permission bits alone do not account for ACLs or read-only mounts.
pub async fn validate_destination(dir: &Path) -> Result<()> {
    let invalid = |reason: String| {
        Error::Download(DownloadError::InvalidDestination {
            path: dir.to_path_buf(),
            reason,
        })
    };

    let metadata = match tokio::fs::metadata(dir).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(invalid("directory does not exist".to_string()));
        }
        Err(e) => return Err(invalid(e.to_string())),
    };
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }

    let probe = dir.join(format!(
        ".media-dl-write-probe-{}-{}",
        std::process::id(),
        PROBE_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .await
        .map_err(|e| invalid(format!("not writable: {e}")))?;
    drop(file);
    if let Err(e) = tokio::fs::remove_file(&probe).await {
        tracing::warn!(path = %probe.display(), error = %e, "failed to remove write probe");
    }

    Ok(())
}
