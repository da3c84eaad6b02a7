//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Admission, metadata lookup, search and snapshots
//! - [`control`] - Item lifecycle control (start/pause/resume/cancel/remove)
//! - [`callbacks`] - Worker-to-coordinator update entry points and the update loop
//! - [`worker`] - Per-item download workers
//! - [`lifecycle`] - Shutdown coordination
//!
//! All item state lives behind one lock owned by the coordinator. Workers never
//! touch it: they send [`WorkerMessage`](worker::WorkerMessage)s over a channel
//! that a single update loop applies in arrival order.

mod callbacks;
mod control;
mod lifecycle;
mod queue;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use queue::DEFAULT_SEARCH_LIMIT;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{MediaFetcher, NoOpFetcher, YtDlpFetcher};
use crate::types::{Event, ItemId, QueueItem};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize};
use tokio_util::sync::CancellationToken;

use worker::WorkerMessage;

/// Buffer size for the worker message channel
pub(crate) const WORKER_CHANNEL_BUFFER: usize = 500;

/// Signals shared between the coordinator and one running worker
#[derive(Clone, Debug)]
pub(crate) struct WorkerHandle {
    /// Spawn counter value this worker was started with
    pub(crate) attempt: u32,
    /// Cancelled when the binding is detached (cancel, remove, terminal callback, shutdown)
    pub(crate) cancel: CancellationToken,
    /// Set while the item is paused; the worker's progress hook polls it
    pub(crate) paused: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn new(attempt: u32) -> Self {
        Self {
            attempt,
            cancel: CancellationToken::new(),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Items plus their worker bindings, guarded together
#[derive(Debug, Default)]
pub(crate) struct QueueInner {
    /// Items in admission order
    pub(crate) items: Vec<QueueItem>,
    /// At most one binding per item, present only while it is Downloading or Paused
    pub(crate) workers: HashMap<ItemId, WorkerHandle>,
}

impl QueueInner {
    pub(crate) fn item_mut(&mut self, id: ItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Remove a binding and signal its worker to stop
    pub(crate) fn detach_worker(&mut self, id: ItemId) -> Option<WorkerHandle> {
        let handle = self.workers.remove(&id)?;
        handle.cancel.cancel();
        Some(handle)
    }
}

/// Queue and worker state management
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Items and worker bindings (single lock so both change atomically)
    pub(crate) inner: Arc<tokio::sync::Mutex<QueueInner>>,
    /// Next item identifier
    pub(crate) next_id: Arc<AtomicU64>,
    /// Optional cap on workers that are inside the fetcher at once
    pub(crate) concurrent_limit: Option<Arc<tokio::sync::Semaphore>>,
    /// Number of worker tasks that have not yet exited
    pub(crate) live_workers: Arc<AtomicUsize>,
    /// Flag to indicate whether new items are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl QueueState {
    fn new(config: &Config) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(QueueInner::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            concurrent_limit: config
                .download
                .max_concurrent_downloads
                .map(|n| Arc::new(tokio::sync::Semaphore::new(n))),
            live_workers: Arc::new(AtomicUsize::new(0)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// This is the queue coordinator: the only writer of item state. Control
/// operations return immediately after updating state and signalling workers;
/// the downloads themselves run on their own tasks.
#[derive(Clone)]
pub struct MediaDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Extraction backend (trait object for pluggable implementations)
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    /// Whether stream merging and audio transcoding are available
    pub(crate) encoder_available: bool,
    /// Queue and worker state management
    pub(crate) queue_state: QueueState,
    /// Sender half of the worker message channel, cloned into each worker
    pub(crate) worker_tx: tokio::sync::mpsc::Sender<WorkerMessage>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Creates the default download directory
    /// - Locates yt-dlp and ffmpeg (falling back to a no-op fetcher)
    /// - Starts the update loop that applies worker messages
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the download
    /// directory cannot be created.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let fetcher: Arc<dyn MediaFetcher> = match YtDlpFetcher::from_config(&config) {
            Some(f) => Arc::new(f),
            None => {
                tracing::warn!("yt-dlp not found, downloads will fail until it is installed");
                Arc::new(NoOpFetcher)
            }
        };

        Self::with_fetcher(config, fetcher)
    }

    /// Create a downloader around an explicit fetcher implementation
    ///
    /// Must be called from within a Tokio runtime, since it spawns the update
    /// loop.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn MediaFetcher>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.download.event_buffer);
        let (worker_tx, worker_rx) = tokio::sync::mpsc::channel(WORKER_CHANNEL_BUFFER);

        let caps = fetcher.capabilities();
        tracing::info!(
            fetcher = fetcher.name(),
            can_download = caps.can_download,
            can_search = caps.can_search,
            can_transcode = caps.can_transcode,
            "Fetcher initialized"
        );

        let queue_state = QueueState::new(&config);
        callbacks::spawn_update_loop(queue_state.clone(), event_tx.clone(), worker_rx);

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            fetcher,
            encoder_available: caps.can_transcode,
            queue_state,
            worker_tx,
        })
    }

    /// Subscribe to queue events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. A subscriber that falls more than `event_buffer` events
    /// behind receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{Config, MediaDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             println!("{event:?}");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Query what the configured fetcher can do
    pub fn capabilities(&self) -> crate::types::Capabilities {
        let caps = self.fetcher.capabilities();
        crate::types::Capabilities {
            fetcher: self.fetcher.name().to_string(),
            can_transcode: self.encoder_available,
            can_search: caps.can_search,
        }
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
