//! Worker-to-coordinator update entry points.
//!
//! Every state change a worker causes goes through here, under the queue lock.
//! Updates that no longer apply (unknown item, wrong state, superseded or
//! detached worker) are stale: they are logged at debug level and dropped.

use crate::progress::{self, ProgressUpdate};
use crate::types::{Event, ItemId, Status};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};

use super::worker::WorkerMessage;
use super::{MediaDownloader, QueueInner, QueueState};

/// Whether an update from `attempt` may touch the item
///
/// `None` means the update comes through the public entry points rather than
/// from a tagged worker message, so only the item's state is checked.
fn binding_matches(inner: &QueueInner, id: ItemId, attempt: Option<u32>) -> bool {
    match attempt {
        Some(attempt) => inner
            .workers
            .get(&id)
            .is_some_and(|handle| handle.attempt == attempt),
        None => true,
    }
}

fn stale(id: ItemId, attempt: Option<u32>, what: &str) {
    tracing::debug!(item_id = id.get(), ?attempt, update = what, "Ignoring stale update");
}

impl QueueState {
    /// Apply a progress update; `percent` never moves backwards
    pub(crate) async fn apply_progress(
        &self,
        id: ItemId,
        attempt: Option<u32>,
        update: ProgressUpdate,
    ) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        if !binding_matches(&inner, id, attempt) {
            stale(id, attempt, "progress");
            return None;
        }
        let Some(item) = inner.item_mut(id) else {
            stale(id, attempt, "progress");
            return None;
        };
        if item.status != Status::Downloading {
            stale(id, attempt, "progress");
            return None;
        }

        if let Some(p) = update.percent.filter(|p| p.is_finite()) {
            item.progress_percent = item.progress_percent.max(p.clamp(0.0, 100.0));
        }
        item.speed_bps = update.speed_bps;
        item.eta_secs = update.eta_secs;
        item.status_text = update.status.clone();

        Some(Event::Progress {
            id,
            percent: update.percent.map(|_| item.progress_percent),
            speed_bps: update.speed_bps,
            eta_secs: update.eta_secs,
            status: update.status,
        })
    }

    /// Note that the transfer finished and post-processing is underway
    pub(crate) async fn apply_processing(&self, id: ItemId, attempt: Option<u32>) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        if !binding_matches(&inner, id, attempt) {
            stale(id, attempt, "processing");
            return None;
        }
        match inner.item_mut(id) {
            Some(item) if item.status == Status::Downloading => {
                item.status_text = "Processing".to_string();
                item.speed_bps = None;
                item.eta_secs = None;
                Some(Event::Processing { id })
            }
            _ => {
                stale(id, attempt, "processing");
                None
            }
        }
    }

    /// Transition to `Completed` and record the output path
    pub(crate) async fn apply_completed(
        &self,
        id: ItemId,
        attempt: Option<u32>,
        path: PathBuf,
    ) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        if !binding_matches(&inner, id, attempt) {
            stale(id, attempt, "completed");
            return None;
        }
        if !inner.item_mut(id).is_some_and(|item| item.status.is_active()) {
            stale(id, attempt, "completed");
            return None;
        }

        inner.detach_worker(id);
        let item = inner.item_mut(id)?;
        item.status = Status::Completed;
        item.progress_percent = 100.0;
        item.speed_bps = None;
        item.eta_secs = None;
        item.status_text = "Completed".to_string();
        item.set_output_path(path.clone());

        tracing::info!(item_id = id.get(), path = %path.display(), "Item completed");
        Some(Event::Completed { id, path })
    }

    /// Transition to `Failed` and record the error
    pub(crate) async fn apply_failed(
        &self,
        id: ItemId,
        attempt: Option<u32>,
        error: String,
    ) -> Option<Event> {
        let mut inner = self.inner.lock().await;
        if !binding_matches(&inner, id, attempt) {
            stale(id, attempt, "failed");
            return None;
        }
        if !inner.item_mut(id).is_some_and(|item| item.status.is_active()) {
            stale(id, attempt, "failed");
            return None;
        }

        inner.detach_worker(id);
        let item = inner.item_mut(id)?;
        item.status = Status::Failed;
        item.speed_bps = None;
        item.eta_secs = None;
        item.status_text = format!("Failed: {error}");
        item.last_error = Some(error.clone());

        tracing::warn!(item_id = id.get(), error = %error, "Item failed");
        Some(Event::Failed { id, error })
    }

    /// Apply one worker message
    pub(crate) async fn apply(&self, message: WorkerMessage) -> Option<Event> {
        match message {
            WorkerMessage::Progress {
                id,
                attempt,
                update,
            } => self.apply_progress(id, Some(attempt), update).await,
            WorkerMessage::Processing { id, attempt } => {
                self.apply_processing(id, Some(attempt)).await
            }
            WorkerMessage::Completed { id, attempt, path } => {
                self.apply_completed(id, Some(attempt), path).await
            }
            WorkerMessage::Failed { id, attempt, error } => {
                self.apply_failed(id, Some(attempt), error).await
            }
            // Only reachable with a live binding if the fetcher gave up on its own
            WorkerMessage::Aborted { id, attempt } => {
                self.apply_failed(id, Some(attempt), "download aborted".to_string())
                    .await
            }
        }
    }
}

/// Spawn the single-writer loop that applies worker messages in arrival order
pub(crate) fn spawn_update_loop(
    state: QueueState,
    event_tx: broadcast::Sender<Event>,
    mut rx: mpsc::Receiver<WorkerMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let (id, attempt) = (message.id(), message.attempt());
            tracing::trace!(item_id = id.get(), attempt, ?message, "Worker message");
            if let Some(event) = state.apply(message).await {
                event_tx.send(event).ok();
            }
        }
        tracing::debug!("Worker channel closed, update loop exiting");
    })
}

impl MediaDownloader {
    /// Record progress for a downloading item
    ///
    /// `percent` is clamped to [0, 100] and never lowers the stored value.
    /// Returns `false` (and changes nothing) if the item is absent or not
    /// `Downloading`; a late update for a removed or paused item is not an error.
    pub async fn on_progress(
        &self,
        id: ItemId,
        percent: Option<f32>,
        speed_bps: Option<u64>,
        eta_secs: Option<u64>,
    ) -> bool {
        let update = ProgressUpdate {
            percent,
            speed_bps,
            eta_secs,
            status: progress::status_line(percent, speed_bps, eta_secs, None),
        };
        self.emit_applied(self.queue_state.apply_progress(id, None, update).await)
    }

    /// Mark an active item `Completed` with its resolved output path
    ///
    /// Accepted from `Downloading` or `Paused`; any bound worker is detached.
    pub async fn on_completed(&self, id: ItemId, output_path: impl Into<PathBuf>) -> bool {
        let event = self
            .queue_state
            .apply_completed(id, None, output_path.into())
            .await;
        self.emit_applied(event)
    }

    /// Mark an active item `Failed` with an error description
    ///
    /// Accepted from `Downloading` or `Paused`; any bound worker is detached.
    pub async fn on_failed(&self, id: ItemId, error: impl Into<String>) -> bool {
        let event = self.queue_state.apply_failed(id, None, error.into()).await;
        self.emit_applied(event)
    }

    fn emit_applied(&self, event: Option<Event>) -> bool {
        match event {
            Some(event) => {
                self.emit_event(event);
                true
            }
            None => false,
        }
    }
}
