//! Admission, metadata lookup, search and queue snapshots.

use crate::error::{Error, Result};
use crate::types::{
    Event, FormatRequest, ItemId, MediaMetadata, QueueItem, QueueStats, SearchResult,
    SourceDescriptor, Status,
};
use crate::utils;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use super::MediaDownloader;

/// Number of results returned by a search when the caller has no preference
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

impl MediaDownloader {
    /// Admit a new item in the `Queued` state
    ///
    /// Only structural validation happens here: a non-empty URL and a
    /// non-empty destination path. Reachability and the destination directory
    /// itself are checked when the item is started.
    ///
    /// # Arguments
    ///
    /// * `source` - URL plus the metadata resolved for it
    /// * `request` - Media kind and quality tier
    /// * `destination_dir` - Directory the output file is written to
    ///
    /// # Returns
    ///
    /// The new item's identifier. Identifiers are never reused.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an empty URL or destination path
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    pub async fn admit(
        &self,
        source: SourceDescriptor,
        request: FormatRequest,
        destination_dir: impl Into<PathBuf>,
    ) -> Result<ItemId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let destination_dir = destination_dir.into();
        if source.url.trim().is_empty() {
            return Err(Error::InvalidInput("source URL is empty".to_string()));
        }
        if destination_dir.as_os_str().is_empty() {
            return Err(Error::InvalidInput(
                "destination directory is empty".to_string(),
            ));
        }

        let id = ItemId::new(self.queue_state.next_id.fetch_add(1, Ordering::SeqCst));
        let title = source.title().to_string();
        let item = QueueItem::new(id, source, request, destination_dir);

        tracing::info!(
            item_id = id.get(),
            title = %title,
            kind = request.kind().label(),
            quality = %request.quality(),
            "Item queued"
        );

        self.queue_state.inner.lock().await.items.push(item);
        self.emit_event(Event::Queued { id, title });
        Ok(id)
    }

    /// Validate a URL and look up its metadata
    ///
    /// The URL must be http(s) and its host (with or without `www.`) must be
    /// one of `supported_hosts`. A bare domain without a path is rejected.
    pub async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata> {
        let parsed = utils::validate_media_url(url, &self.config.fetch.supported_hosts)?;
        tracing::debug!(url = %parsed, "Fetching metadata");
        self.fetcher.fetch_metadata(parsed.as_str()).await
    }

    /// Look up metadata for `url` and admit it in one step
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader) -> Result<()> {
    /// let request = FormatRequest::new(MediaKind::AudioStandard, Quality::Medium)?;
    /// let id = downloader
    ///     .add_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ", request, "downloads")
    ///     .await?;
    /// downloader.start(id).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_url(
        &self,
        url: &str,
        request: FormatRequest,
        destination_dir: impl Into<PathBuf>,
    ) -> Result<ItemId> {
        let parsed = utils::validate_media_url(url, &self.config.fetch.supported_hosts)?;
        let metadata = self.fetcher.fetch_metadata(parsed.as_str()).await?;
        self.admit(SourceDescriptor::new(parsed.as_str(), metadata), request, destination_dir)
            .await
    }

    /// Search for media by free-text query
    ///
    /// Returns at most `limit` results; pick one and pass its `url` to
    /// [`add_url`](Self::add_url).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for a blank query
    /// - [`Error::NotSupported`] if the fetcher cannot search
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("search query is empty".to_string()));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let results = self.fetcher.search(query, limit).await?;
        tracing::debug!(query, count = results.len(), "Search finished");
        Ok(results)
    }

    /// Snapshot of every item in admission order
    ///
    /// The returned items are copies; later queue changes do not affect them.
    pub async fn items(&self) -> Vec<QueueItem> {
        self.queue_state.inner.lock().await.items.clone()
    }

    /// Snapshot of one item
    pub async fn item(&self, id: ItemId) -> Option<QueueItem> {
        self.queue_state
            .inner
            .lock()
            .await
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Item counts by status
    pub async fn stats(&self) -> QueueStats {
        let inner = self.queue_state.inner.lock().await;
        let mut stats = QueueStats {
            total: inner.items.len(),
            ..QueueStats::default()
        };
        for item in &inner.items {
            match item.status {
                Status::Queued => stats.queued += 1,
                Status::Downloading => stats.downloading += 1,
                Status::Paused => stats.paused += 1,
                Status::Completed => stats.completed += 1,
                Status::Cancelled => stats.cancelled += 1,
                Status::Failed => stats.failed += 1,
            }
        }
        stats
    }
}
