//! Scripted fetcher used in place of yt-dlp

use async_trait::async_trait;
use media_dl::fetcher::{
    DownloadRequest, FetchPhase, FetchProgress, FetcherCapabilities, HookAction, MediaFetcher,
    ProgressHook,
};
use media_dl::{Error, FetchError, MediaMetadata, Result, SearchResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// What the scripted fetcher does for a given URL
#[derive(Clone, Debug)]
pub enum Script {
    /// Report progress in `steps` equal chunks of `total` bytes, then write `<base>.<ext>`
    Succeed { total: u64, steps: u64, ext: &'static str },
    /// Report some progress then fail with a tool error
    Fail { message: &'static str },
    /// Report progress slowly until aborted or the gate opens
    Gate { ext: &'static str },
}

/// A fetcher driven by per-URL scripts instead of an external binary
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    gate_open: AtomicBool,
    step_delay: Duration,
    pub downloads: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(step_delay: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            gate_open: AtomicBool::new(false),
            step_delay,
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn script(&self, url: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), script);
    }

    /// Let every gated download finish
    pub fn open_gate(&self) {
        self.gate_open.store(true, Ordering::SeqCst);
    }

    fn script_for(&self, url: &str) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Script::Succeed {
                total: 1000,
                steps: 4,
                ext: "mp4",
            })
    }
}

fn downloading(done: u64, total: u64) -> FetchProgress {
    FetchProgress {
        phase: FetchPhase::Downloading,
        downloaded_bytes: done,
        total_bytes: Some(total),
        speed_bps: Some(512.0 * 1024.0),
        eta_secs: Some(total.saturating_sub(done) / 1000),
    }
}

fn write_output(request: &DownloadRequest, ext: &str) -> Result<PathBuf> {
    let template = request.output_template.to_string_lossy();
    let stem = template.strip_suffix("%(ext)s").unwrap_or(&template);
    let path = PathBuf::from(format!("{}{ext}", stem.replace("%%", "%")));
    std::fs::write(&path, b"scripted media")?;
    Ok(path)
}

async fn report(hook: &dyn ProgressHook, progress: FetchProgress) -> Result<()> {
    match hook.on_progress(progress).await {
        HookAction::Continue => Ok(()),
        HookAction::Abort => Err(FetchError::Aborted.into()),
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata> {
        let id = url.rsplit('=').next().unwrap_or("unknown").to_string();
        Ok(MediaMetadata {
            title: format!("Clip {id}"),
            id,
            uploader: "Scripted Channel".to_string(),
            duration_secs: Some(42),
            thumbnail_url: None,
            ext: "mp4".to_string(),
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        hook: &dyn ProgressHook,
    ) -> Result<Option<PathBuf>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        match self.script_for(&request.url) {
            Script::Succeed { total, steps, ext } => {
                for step in 1..=steps {
                    report(hook, downloading(total * step / steps, total)).await?;
                    tokio::time::sleep(self.step_delay).await;
                }
                report(
                    hook,
                    FetchProgress {
                        phase: FetchPhase::Finished,
                        ..downloading(total, total)
                    },
                )
                .await?;
                // Report the path, the way yt-dlp's after_move print does
                Ok(Some(write_output(request, ext)?))
            }
            Script::Fail { message } => {
                report(hook, downloading(10, 100)).await?;
                Err(Error::Fetch(FetchError::Exited {
                    tool: "scripted".to_string(),
                    code: Some(1),
                    stderr: message.to_string(),
                }))
            }
            Script::Gate { ext } => {
                let mut done = 0;
                while !self.gate_open.load(Ordering::SeqCst) {
                    done = (done + 1).min(99);
                    report(hook, downloading(done, 100)).await?;
                    tokio::time::sleep(self.step_delay).await;
                }
                report(hook, downloading(100, 100)).await?;
                Ok(Some(write_output(request, ext)?))
            }
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        Ok((1..=limit)
            .map(|n| SearchResult {
                title: format!("{query} result {n}"),
                channel: "Scripted Channel".to_string(),
                duration_secs: Some(60 * n as u64),
                thumbnail_url: None,
                url: format!("https://www.youtube.com/watch?v={query}{n}"),
            })
            .collect())
    }

    fn capabilities(&self) -> FetcherCapabilities {
        FetcherCapabilities {
            can_download: true,
            can_search: true,
            can_transcode: true,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
