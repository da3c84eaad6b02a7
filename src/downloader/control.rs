//! Item lifecycle control (start/pause/resume/cancel/remove).
//!
//! All operations return as soon as state is updated and the worker has been
//! signalled. None of them wait for a worker to react.

use crate::error::{Error, Result};
use crate::types::{Event, ItemId, Status};
use crate::utils;
use std::sync::atomic::Ordering;

use super::worker::{WorkerParams, spawn_worker};
use super::{MediaDownloader, WorkerHandle};

impl MediaDownloader {
    /// Start downloading an item
    ///
    /// Spawns a worker for an item that is `Queued`, or `Failed` (retry in
    /// place). The destination directory is validated here, not at admission.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if a worker was spawned
    /// - `Ok(false)` if the item is unknown, already active, or in a terminal
    ///   state other than `Failed`
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    /// - `DownloadError::InvalidDestination` if the destination directory is
    ///   missing, not a directory, or not writable (the item keeps its state)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader, id: ItemId) -> Result<()> {
    /// if downloader.start(id).await? {
    ///     println!("download {id} started");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(&self, id: ItemId) -> Result<bool> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let destination = {
            let inner = self.queue_state.inner.lock().await;
            match inner.items.iter().find(|item| item.id == id) {
                Some(item) if item.status.can_start() && !inner.workers.contains_key(&id) => {
                    item.destination_dir.clone()
                }
                Some(item) => {
                    tracing::debug!(item_id = id.get(), status = %item.status, "Start ignored");
                    return Ok(false);
                }
                None => {
                    tracing::debug!(item_id = id.get(), "Start ignored for unknown item");
                    return Ok(false);
                }
            }
        };

        // Filesystem probe runs without the queue lock held
        utils::validate_destination(&destination).await?;

        let mut inner = self.queue_state.inner.lock().await;
        // Re-check: the item may have changed while the lock was released
        if inner.workers.contains_key(&id) {
            return Ok(false);
        }
        let Some(item) = inner.item_mut(id) else {
            return Ok(false);
        };
        if !item.status.can_start() {
            return Ok(false);
        }

        item.status = Status::Downloading;
        item.attempts += 1;
        item.progress_percent = 0.0;
        item.speed_bps = None;
        item.eta_secs = None;
        item.last_error = None;
        item.status_text = "Starting".to_string();

        let handle = WorkerHandle::new(item.attempts);
        let params = WorkerParams {
            id,
            attempt: item.attempts,
            source: item.source.clone(),
            request: item.request,
            destination_dir: item.destination_dir.clone(),
            encoder_available: self.encoder_available,
            fetcher: self.fetcher.clone(),
            tx: self.worker_tx.clone(),
            cancel: handle.cancel.clone(),
            paused: handle.paused.clone(),
            concurrent_limit: self.queue_state.concurrent_limit.clone(),
            pause_poll_interval: self.config.download.pause_poll_interval,
            progress_interval: self.config.download.progress_interval,
            live_workers: self.queue_state.live_workers.clone(),
        };
        let attempt = handle.attempt;
        inner.workers.insert(id, handle);
        // Spawned under the lock so no worker message can precede the binding
        spawn_worker(params);
        drop(inner);

        tracing::info!(item_id = id.get(), attempt, "Item started");
        self.emit_event(Event::Started { id });
        Ok(true)
    }

    /// Pause a downloading item
    ///
    /// The worker stops forwarding progress and holds the fetch at its next
    /// progress checkpoint. The transfer itself is not guaranteed to stop
    /// immediately. Progress is frozen until [`resume`](Self::resume).
    ///
    /// Returns `false` if the item is not `Downloading`.
    pub async fn pause(&self, id: ItemId) -> bool {
        let mut inner = self.queue_state.inner.lock().await;
        let Some(paused) = inner.workers.get(&id).map(|h| h.paused.clone()) else {
            tracing::debug!(item_id = id.get(), "Pause ignored, no active worker");
            return false;
        };
        let Some(item) = inner.item_mut(id) else {
            return false;
        };
        if item.status != Status::Downloading {
            tracing::debug!(item_id = id.get(), status = %item.status, "Pause ignored");
            return false;
        }

        paused.store(true, Ordering::SeqCst);
        item.status = Status::Paused;
        item.speed_bps = None;
        item.eta_secs = None;
        item.status_text = "Paused".to_string();
        drop(inner);

        tracing::info!(item_id = id.get(), "Item paused");
        self.emit_event(Event::Paused { id });
        true
    }

    /// Resume a paused item
    ///
    /// Returns to `Downloading` with the accumulated progress intact.
    /// Returns `false` if the item is not `Paused`.
    pub async fn resume(&self, id: ItemId) -> bool {
        let mut inner = self.queue_state.inner.lock().await;
        let Some(paused) = inner.workers.get(&id).map(|h| h.paused.clone()) else {
            tracing::debug!(item_id = id.get(), "Resume ignored, no active worker");
            return false;
        };
        let Some(item) = inner.item_mut(id) else {
            return false;
        };
        if item.status != Status::Paused {
            tracing::debug!(item_id = id.get(), status = %item.status, "Resume ignored");
            return false;
        }

        item.status = Status::Downloading;
        item.status_text = "Resuming".to_string();
        paused.store(false, Ordering::SeqCst);
        drop(inner);

        tracing::info!(item_id = id.get(), "Item resumed");
        self.emit_event(Event::Resumed { id });
        true
    }

    /// Cancel an item
    ///
    /// Valid from any non-terminal state. The item becomes `Cancelled`
    /// immediately; its worker (if any) is detached and stops at its next
    /// checkpoint. Cancellation wins over a pending pause.
    ///
    /// Returns `false` if the item is unknown or already terminal.
    pub async fn cancel(&self, id: ItemId) -> bool {
        let mut inner = self.queue_state.inner.lock().await;
        let cancelled = cancel_locked(&mut inner, id);
        drop(inner);

        if cancelled {
            tracing::info!(item_id = id.get(), "Item cancelled");
            self.emit_event(Event::Cancelled { id });
        }
        cancelled
    }

    /// Remove an item from the queue
    ///
    /// Cancels it first if it is still active, then evicts it. Idempotent:
    /// returns `false` if the item is already gone.
    pub async fn remove(&self, id: ItemId) -> bool {
        let mut inner = self.queue_state.inner.lock().await;
        let Some(index) = inner.items.iter().position(|item| item.id == id) else {
            tracing::debug!(item_id = id.get(), "Remove ignored for unknown item");
            return false;
        };

        // Detach before eviction so no worker update can reach the item
        let cancelled = cancel_locked(&mut inner, id);
        inner.items.remove(index);
        drop(inner);

        if cancelled {
            self.emit_event(Event::Cancelled { id });
        }
        tracing::info!(item_id = id.get(), "Item removed");
        self.emit_event(Event::Removed { id });
        true
    }
}

/// Move a non-terminal item to `Cancelled` and detach its worker
pub(crate) fn cancel_locked(inner: &mut super::QueueInner, id: ItemId) -> bool {
    let Some(item) = inner.item_mut(id) else {
        return false;
    };
    if item.status.is_terminal() {
        return false;
    }

    item.status = Status::Cancelled;
    item.speed_bps = None;
    item.eta_secs = None;
    item.status_text = "Cancelled".to_string();
    inner.detach_worker(id);
    true
}
