//! Per-item download workers.
//!
//! A worker owns nothing but copies of what it needs. It talks back to the
//! coordinator only through [`WorkerMessage`]s and sends exactly one terminal
//! message per spawn.

use crate::error::DownloadError;
use crate::fetcher::{
    DownloadRequest, FetchPhase, FetchProgress, HookAction, MediaFetcher, ProgressHook,
};
use crate::format;
use crate::progress::{ProgressReporter, ProgressUpdate};
use crate::types::{FormatRequest, ItemId, SourceDescriptor};
use crate::utils;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Immutable update sent from a worker to the coordinator's update loop
///
/// Every message carries the `(id, attempt)` pair of the worker that produced
/// it, so messages from a superseded or detached worker can be discarded.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum WorkerMessage {
    /// A coalesced progress update
    Progress {
        id: ItemId,
        attempt: u32,
        update: ProgressUpdate,
    },
    /// The transfer finished and post-processing started
    Processing { id: ItemId, attempt: u32 },
    /// Output file resolved
    Completed {
        id: ItemId,
        attempt: u32,
        path: PathBuf,
    },
    /// The fetch or output resolution failed
    Failed {
        id: ItemId,
        attempt: u32,
        error: String,
    },
    /// The worker stopped because its binding was cancelled
    Aborted { id: ItemId, attempt: u32 },
}

impl WorkerMessage {
    pub(crate) fn id(&self) -> ItemId {
        match self {
            WorkerMessage::Progress { id, .. }
            | WorkerMessage::Processing { id, .. }
            | WorkerMessage::Completed { id, .. }
            | WorkerMessage::Failed { id, .. }
            | WorkerMessage::Aborted { id, .. } => *id,
        }
    }

    pub(crate) fn attempt(&self) -> u32 {
        match self {
            WorkerMessage::Progress { attempt, .. }
            | WorkerMessage::Processing { attempt, .. }
            | WorkerMessage::Completed { attempt, .. }
            | WorkerMessage::Failed { attempt, .. }
            | WorkerMessage::Aborted { attempt, .. } => *attempt,
        }
    }
}

/// Parameters for spawning a download worker
pub(crate) struct WorkerParams {
    /// Item ID
    pub id: ItemId,
    /// Spawn counter for this item
    pub attempt: u32,
    /// What to fetch
    pub source: SourceDescriptor,
    /// Requested kind and quality
    pub request: FormatRequest,
    /// Validated destination directory
    pub destination_dir: PathBuf,
    /// Whether the full format-selector row applies
    pub encoder_available: bool,
    /// Extraction backend
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Channel to the coordinator's update loop
    pub tx: mpsc::Sender<WorkerMessage>,
    /// Cancelled when the coordinator detaches this worker
    pub cancel: CancellationToken,
    /// Pause flag owned by the coordinator
    pub paused: Arc<AtomicBool>,
    /// Optional concurrency cap
    pub concurrent_limit: Option<Arc<tokio::sync::Semaphore>>,
    /// Busy-wait interval while paused
    pub pause_poll_interval: Duration,
    /// Progress coalescing window
    pub progress_interval: Duration,
    /// Live worker counter (decremented when the task exits)
    pub live_workers: Arc<AtomicUsize>,
}

/// Decrements the live worker count when the worker task ends, however it ends
struct LiveWorkerGuard(Arc<AtomicUsize>);

impl LiveWorkerGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveWorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawn a worker task for one item
pub(crate) fn spawn_worker(params: WorkerParams) -> tokio::task::JoinHandle<()> {
    let guard = LiveWorkerGuard::new(params.live_workers.clone());
    tokio::spawn(async move {
        let _guard = guard;
        let id = params.id;
        let attempt = params.attempt;
        let tx = params.tx.clone();

        let outcome = run_worker(params).await;
        match &outcome {
            WorkerMessage::Completed { path, .. } => {
                tracing::info!(item_id = id.get(), attempt, path = %path.display(), "Download completed");
            }
            WorkerMessage::Failed { error, .. } => {
                tracing::warn!(item_id = id.get(), attempt, error = %error, "Download failed");
            }
            WorkerMessage::Aborted { .. } => {
                tracing::debug!(item_id = id.get(), attempt, "Worker stopped after cancellation");
            }
            _ => {}
        }
        tx.send(outcome).await.ok();
    })
}

async fn run_worker(params: WorkerParams) -> WorkerMessage {
    let WorkerParams {
        id,
        attempt,
        source,
        request,
        destination_dir,
        encoder_available,
        fetcher,
        tx,
        cancel,
        paused,
        concurrent_limit,
        pause_poll_interval,
        progress_interval,
        live_workers: _,
    } = params;

    let _permit = match concurrent_limit {
        Some(semaphore) => {
            tokio::select! {
                permit = semaphore.acquire_owned() => match permit {
                    Ok(p) => Some(p),
                    Err(e) => {
                        return WorkerMessage::Failed {
                            id,
                            attempt,
                            error: format!("worker pool closed: {e}"),
                        };
                    }
                },
                _ = cancel.cancelled() => return WorkerMessage::Aborted { id, attempt },
            }
        }
        None => None,
    };

    // Checkpoint before handing control to the fetcher
    if cancel.is_cancelled() {
        return WorkerMessage::Aborted { id, attempt };
    }

    let base = utils::build_base_name(source.title(), chrono::Local::now());
    let output_template = utils::output_template(&destination_dir, &base);
    let selection = format::select(request, encoder_available);
    let expected_ext = selection.expected_extension();

    tracing::info!(
        item_id = id.get(),
        attempt,
        url = %source.url,
        selector = %selection.selector,
        template = %output_template.display(),
        "Starting download"
    );

    let download_request = DownloadRequest {
        url: source.url.clone(),
        selection,
        output_template: output_template.clone(),
    };
    let hook = WorkerHook {
        id,
        attempt,
        tx,
        cancel: cancel.clone(),
        paused,
        pause_poll_interval,
        reporter: tokio::sync::Mutex::new(ProgressReporter::new(progress_interval)),
        processing_sent: AtomicBool::new(false),
    };

    match fetcher.download(&download_request, &hook).await {
        Ok(reported) => {
            match utils::resolve_output_path(&destination_dir, &base, expected_ext, reported.as_deref())
            {
                Some(path) => WorkerMessage::Completed { id, attempt, path },
                None => WorkerMessage::Failed {
                    id,
                    attempt,
                    error: DownloadError::OutputNotFound {
                        template: output_template,
                    }
                    .to_string(),
                },
            }
        }
        Err(e) if e.is_aborted() || cancel.is_cancelled() => WorkerMessage::Aborted { id, attempt },
        Err(e) => WorkerMessage::Failed {
            id,
            attempt,
            error: e.to_string(),
        },
    }
}

/// Progress hook bridging the fetcher into the coordinator
///
/// Order of checks per sample: cancellation first, then the pause flag
/// (sleeping and re-checking while set), then forwarding.
struct WorkerHook {
    id: ItemId,
    attempt: u32,
    tx: mpsc::Sender<WorkerMessage>,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    pause_poll_interval: Duration,
    reporter: tokio::sync::Mutex<ProgressReporter>,
    processing_sent: AtomicBool,
}

#[async_trait]
impl ProgressHook for WorkerHook {
    async fn on_progress(&self, progress: FetchProgress) -> HookAction {
        if self.cancel.is_cancelled() {
            return HookAction::Abort;
        }

        // Best-effort pause: hold the fetcher here until resumed or cancelled
        while self.paused.load(Ordering::SeqCst) {
            tokio::select! {
                _ = tokio::time::sleep(self.pause_poll_interval) => {}
                _ = self.cancel.cancelled() => return HookAction::Abort,
            }
        }

        match progress.phase {
            FetchPhase::Finished => {
                if !self.processing_sent.swap(true, Ordering::SeqCst) {
                    self.send(WorkerMessage::Processing {
                        id: self.id,
                        attempt: self.attempt,
                    })
                    .await;
                }
            }
            FetchPhase::Downloading => {
                let update = self.reporter.lock().await.sample(&progress);
                if let Some(update) = update {
                    self.send(WorkerMessage::Progress {
                        id: self.id,
                        attempt: self.attempt,
                        update,
                    })
                    .await;
                }
            }
        }

        HookAction::Continue
    }
}

impl WorkerHook {
    async fn send(&self, message: WorkerMessage) {
        if self.tx.send(message).await.is_err() {
            tracing::debug!(item_id = self.id.get(), "Update loop gone, dropping worker message");
        }
    }
}
