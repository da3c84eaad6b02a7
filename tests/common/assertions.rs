//! Custom test assertions for integration tests

use media_dl::{Event, ItemId, MediaDownloader, Status};
use std::time::Duration;

/// Result of waiting for an item to finish
#[derive(Debug)]
pub enum WaitResult {
    /// Item completed with this output file
    Completed(std::path::PathBuf),
    /// Item failed with error
    Failed(String),
    /// Item was cancelled
    Cancelled,
    /// Timeout waiting for a terminal event
    Timeout,
    /// Channel closed or lagged unexpectedly
    ChannelClosed,
}

/// Wait for a terminal event for `id` on an already-open subscription
///
/// Subscribe before starting the item so no event is missed.
pub async fn wait_for_terminal(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: ItemId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { id: event_id, path }) if event_id == id => {
                    return WaitResult::Completed(path);
                }
                Ok(Event::Failed {
                    id: event_id,
                    error,
                }) if event_id == id => {
                    return WaitResult::Failed(error);
                }
                Ok(Event::Cancelled { id: event_id }) if event_id == id => {
                    return WaitResult::Cancelled;
                }
                Ok(_) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Collect all events until timeout or predicate is satisfied
pub async fn collect_events_until<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    timeout: Duration,
    mut stop_predicate: F,
) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut collected = Vec::new();

    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let should_stop = stop_predicate(&event);
            collected.push(event);
            if should_stop {
                break;
            }
        }
    })
    .await;

    collected
}

/// Poll the queue until the item reports `status`
pub async fn wait_for_status(
    downloader: &MediaDownloader,
    id: ItemId,
    status: Status,
    timeout: Duration,
) -> bool {
    tokio::time::timeout(timeout, async {
        loop {
            if downloader.item(id).await.map(|item| item.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// Assert that an item completed and its output file exists
pub async fn assert_item_completed(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: ItemId,
    timeout: Duration,
) -> std::path::PathBuf {
    match wait_for_terminal(events, id, timeout).await {
        WaitResult::Completed(path) => {
            assert!(path.is_file(), "output {:?} does not exist", path);
            path
        }
        other => panic!("Expected item {} to complete, got {:?}", id, other),
    }
}

/// Assert that an item failed with an error containing `expected`
pub async fn assert_item_failed(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: ItemId,
    timeout: Duration,
    expected: &str,
) {
    match wait_for_terminal(events, id, timeout).await {
        WaitResult::Failed(error) => assert!(
            error.contains(expected),
            "Expected error to contain '{}', got: {}",
            expected,
            error
        ),
        other => panic!("Expected item {} to fail, got {:?}", id, other),
    }
}
