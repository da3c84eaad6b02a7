//! Shutdown coordination.

use crate::error::Result;
use crate::types::{Event, ItemId};
use std::sync::atomic::Ordering;

use super::MediaDownloader;
use super::control::cancel_locked;

impl MediaDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops admitting and starting items
    /// 2. Cancels every active item (their workers are detached and signalled)
    /// 3. Waits up to `shutdown_timeout` for worker tasks to exit
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Queued items stay queued; the queue can still be inspected afterwards.
    /// Calling this more than once is harmless.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` leaves room for teardown steps that
    /// can fail.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new work
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new items");

        // 2. Cancel everything that has a worker
        let cancelled = self.cancel_all_active().await;
        tracing::info!(cancelled = cancelled.len(), "Cancelled active items");

        // 3. Wait for worker tasks to drain
        let shutdown_timeout = self.config.download.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, self.wait_for_workers()).await {
            Ok(()) => tracing::info!("All workers stopped"),
            Err(_) => tracing::warn!(
                live_workers = self.queue_state.live_workers.load(Ordering::SeqCst),
                "Timeout waiting for workers to stop, proceeding with shutdown"
            ),
        }

        // 4. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn cancel_all_active(&self) -> Vec<ItemId> {
        let mut inner = self.queue_state.inner.lock().await;
        let active: Vec<ItemId> = inner
            .items
            .iter()
            .filter(|item| item.status.is_active())
            .map(|item| item.id)
            .collect();

        let cancelled: Vec<ItemId> = active
            .into_iter()
            .filter(|id| cancel_locked(&mut inner, *id))
            .collect();
        drop(inner);

        for id in &cancelled {
            tracing::debug!(item_id = id.get(), "Cancelled for shutdown");
            self.emit_event(Event::Cancelled { id: *id });
        }
        cancelled
    }

    async fn wait_for_workers(&self) {
        loop {
            let live = self.queue_state.live_workers.load(Ordering::SeqCst);
            if live == 0 {
                return;
            }

            tracing::debug!(live_workers = live, "Waiting for workers to stop");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
