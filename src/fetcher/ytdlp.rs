//! Fetcher backed by the external yt-dlp binary

use super::parser::{
    OUTPUT_TEMPLATE, PROGRESS_TEMPLATE, ToolLine, parse_line, parse_metadata,
    parse_search_results,
};
use super::traits::{
    DownloadRequest, FetcherCapabilities, HookAction, MediaFetcher, ProgressHook,
};
use crate::config::{Config, FetchConfig};
use crate::error::{Error, FetchError};
use crate::types::{MediaMetadata, SearchResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

const TOOL_NAME: &str = "yt-dlp";

/// Number of trailing stderr lines kept for error messages
const STDERR_TAIL_LINES: usize = 20;

/// Fetcher that shells out to `yt-dlp`
///
/// Progress is read line by line from stdout using a fixed progress template,
/// so the tool's own console formatting never needs to be parsed. When an
/// ffmpeg binary is known it is passed through for stream merging and audio
/// extraction.
///
/// # Examples
///
/// ```no_run
/// use media_dl::config::FetchConfig;
/// use media_dl::fetcher::{MediaFetcher, YtDlpFetcher};
/// use std::path::PathBuf;
///
/// // Explicit binaries
/// let fetcher = YtDlpFetcher::new(
///     PathBuf::from("/usr/local/bin/yt-dlp"),
///     Some(PathBuf::from("/usr/bin/ffmpeg")),
///     FetchConfig::default(),
/// );
/// assert!(fetcher.capabilities().can_transcode);
///
/// // Or auto-discover both from PATH
/// let fetcher = YtDlpFetcher::from_path(FetchConfig::default());
/// ```
pub struct YtDlpFetcher {
    binary_path: PathBuf,
    ffmpeg_path: Option<PathBuf>,
    config: FetchConfig,
}

impl YtDlpFetcher {
    /// Create a fetcher with explicit binary paths
    ///
    /// # Arguments
    ///
    /// * `binary_path` - Path to the yt-dlp binary
    /// * `ffmpeg_path` - Path to ffmpeg, or `None` to download without merging or transcoding
    /// * `config` - Options passed through to every invocation
    pub fn new(binary_path: PathBuf, ffmpeg_path: Option<PathBuf>, config: FetchConfig) -> Self {
        Self {
            binary_path,
            ffmpeg_path,
            config,
        }
    }

    /// Attempt to find yt-dlp (and optionally ffmpeg) in PATH
    ///
    /// Returns `None` if yt-dlp is not found. A missing ffmpeg only disables
    /// transcoding.
    pub fn from_path(config: FetchConfig) -> Option<Self> {
        let binary = which::which(TOOL_NAME).ok()?;
        let ffmpeg = which::which("ffmpeg").ok();
        Some(Self::new(binary, ffmpeg, config))
    }

    /// Build a fetcher from the full configuration
    ///
    /// Explicit tool paths win; otherwise PATH is searched when
    /// `tools.search_path` is enabled. Returns `None` if no yt-dlp binary is
    /// available.
    pub fn from_config(config: &Config) -> Option<Self> {
        let tools = &config.tools;
        let binary = tools.ytdlp_path.clone().or_else(|| {
            tools
                .search_path
                .then(|| which::which(TOOL_NAME).ok())
                .flatten()
        })?;
        let ffmpeg = tools.ffmpeg_path.clone().or_else(|| {
            tools
                .search_path
                .then(|| which::which("ffmpeg").ok())
                .flatten()
        });

        tracing::info!(
            ytdlp = %binary.display(),
            ffmpeg = ?ffmpeg.as_ref().map(|p| p.display().to_string()),
            "using yt-dlp fetcher"
        );
        Some(Self::new(binary, ffmpeg, config.fetch.clone()))
    }

    fn common_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--no-warnings".into(),
            "--socket-timeout".into(),
            self.config.socket_timeout.as_secs().to_string().into(),
        ];
        if let Some(ffmpeg) = &self.ffmpeg_path {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone().into_os_string());
        }
        args
    }

    pub(crate) fn download_args(&self, request: &DownloadRequest) -> Vec<OsString> {
        let mut args = self.common_args();
        args.extend(
            [
                "--newline",
                "--progress",
                "--no-playlist",
                "--progress-template",
                PROGRESS_TEMPLATE,
                "--print",
                OUTPUT_TEMPLATE,
            ]
            .map(OsString::from),
        );
        args.push("--retries".into());
        args.push(self.config.retries.to_string().into());
        args.push("--fragment-retries".into());
        args.push(self.config.fragment_retries.to_string().into());

        args.push("-f".into());
        args.push(request.selection.selector.clone().into());
        if let Some(transcode) = request.selection.transcode {
            args.push("-x".into());
            args.push("--audio-format".into());
            args.push(transcode.codec.as_str().into());
            args.push("--audio-quality".into());
            args.push(format!("{}K", transcode.bitrate_kbps).into());
        }

        args.push("-o".into());
        args.push(request.output_template.clone().into_os_string());
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    /// Run the tool to completion and return stdout, mapping failures
    async fn run_json(&self, args: Vec<OsString>) -> crate::Result<Vec<u8>> {
        let output = Command::new(&self.binary_path)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(FetchError::Exited {
                tool: TOOL_NAME.to_string(),
                code: output.status.code(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
            }
            .into());
        }
        Ok(output.stdout)
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        FetchError::Spawn {
            tool: self.binary_path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch_metadata(&self, url: &str) -> crate::Result<MediaMetadata> {
        let mut args = self.common_args();
        args.extend(["-J", "--no-playlist", "--"].map(OsString::from));
        args.push(url.into());

        let stdout = self.run_json(args).await?;
        Ok(parse_metadata(&stdout)?)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        hook: &dyn ProgressHook,
    ) -> crate::Result<Option<PathBuf>> {
        let mut child = Command::new(&self.binary_path)
            .args(self.download_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Parse("stdout was not captured".into()))?;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_tail(stderr, STDERR_TAIL_LINES)));

        let mut stdout = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut reported = None;
        while let Some(line) = next_lossy_line(&mut stdout, &mut buf).await? {
            match parse_line(&line) {
                ToolLine::Progress(progress) => {
                    if hook.on_progress(progress).await == HookAction::Abort {
                        tracing::debug!(url = %request.url, "abort requested, killing yt-dlp");
                        if let Err(e) = child.kill().await {
                            tracing::warn!(error = %e, "failed to kill yt-dlp");
                        }
                        if let Some(task) = stderr_task {
                            task.abort();
                        }
                        return Err(FetchError::Aborted.into());
                    }
                }
                ToolLine::Output(path) => reported = Some(path),
                ToolLine::Other => tracing::trace!(line = %line, "yt-dlp output"),
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(FetchError::Exited {
                tool: TOOL_NAME.to_string(),
                code: status.code(),
                stderr,
            }
            .into());
        }
        Ok(reported)
    }

    async fn search(&self, query: &str, limit: usize) -> crate::Result<Vec<SearchResult>> {
        let mut args = self.common_args();
        args.extend(["-J", "--flat-playlist", "--"].map(OsString::from));
        args.push(format!("ytsearch{limit}:{query}").into());

        let stdout = self.run_json(args).await?;
        let mut results = parse_search_results(&stdout)?;
        results.truncate(limit);
        Ok(results)
    }

    fn capabilities(&self) -> FetcherCapabilities {
        FetcherCapabilities {
            can_download: true,
            can_search: true,
            can_transcode: self.ffmpeg_path.is_some(),
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Drain a reader, keeping only its last `max_lines` lines
async fn collect_tail<R>(reader: R, max_lines: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = VecDeque::with_capacity(max_lines);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    while let Ok(Some(line)) = next_lossy_line(&mut reader, &mut buf).await {
        tracing::debug!(line = %line, "yt-dlp stderr");
        if kept.len() == max_lines {
            kept.pop_front();
        }
        kept.push_back(line);
    }
    kept.into_iter().collect::<Vec<_>>().join("\n")
}

/// Read one `\n`-terminated line, replacing invalid UTF-8
///
/// The tool echoes titles and paths in whatever encoding the console uses, so
/// a stray byte must not end the stream.
async fn next_lossy_line<R>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(
        String::from_utf8_lossy(buf)
            .trim_end_matches(['\r', '\n'])
            .to_string(),
    ))
}

fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
