//! Tests for concurrent item downloads
//!
//! These tests drive the public API against a scripted fetcher and verify that
//! concurrently running items:
//! - Progress independently, with monotonic percentages per item
//! - Fail in isolation
//! - Respect the optional concurrency cap
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --test parallel_downloads
//! ```

mod common;

use common::{
    Script, WaitResult, assert_item_completed, collect_events_until, create_downloader,
    create_downloader_with_config, test_config, wait_for_terminal,
};
use media_dl::{Event, FormatRequest, ItemId, MediaKind, Quality, Status};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

fn video() -> FormatRequest {
    FormatRequest::new(MediaKind::Video, Quality::Best).unwrap()
}

#[tokio::test]
async fn test_two_items_progress_independently() {
    let (downloader, fetcher, temp_dir) = create_downloader().await;
    let dir = temp_dir.path().join("downloads");
    fetcher.script(
        "https://www.youtube.com/watch?v=fast",
        Script::Succeed {
            total: 400,
            steps: 4,
            ext: "mp4",
        },
    );
    fetcher.script(
        "https://www.youtube.com/watch?v=slow",
        Script::Succeed {
            total: 1000,
            steps: 10,
            ext: "webm",
        },
    );

    let fast = downloader
        .add_url("https://www.youtube.com/watch?v=fast", video(), &dir)
        .await
        .unwrap();
    let slow = downloader
        .add_url("https://www.youtube.com/watch?v=slow", video(), &dir)
        .await
        .unwrap();

    let mut events = downloader.subscribe();
    assert!(downloader.start(fast).await.unwrap());
    assert!(downloader.start(slow).await.unwrap());

    let mut finished = 0;
    let collected = collect_events_until(&mut events, TIMEOUT, |event| {
        if matches!(event, Event::Completed { .. }) {
            finished += 1;
        }
        finished == 2
    })
    .await;

    let mut per_item: HashMap<ItemId, Vec<f32>> = HashMap::new();
    for event in &collected {
        if let Event::Progress {
            id,
            percent: Some(p),
            ..
        } = event
        {
            per_item.entry(*id).or_default().push(*p);
        }
    }
    for (id, percents) in &per_item {
        assert!(
            percents.windows(2).all(|w| w[0] <= w[1]),
            "progress for {id} went backwards: {percents:?}"
        );
    }
    assert_eq!(per_item[&fast].last(), Some(&100.0));
    assert_eq!(per_item[&slow].last(), Some(&100.0));

    let fast_item = downloader.item(fast).await.unwrap();
    let slow_item = downloader.item(slow).await.unwrap();
    assert_eq!(fast_item.status, Status::Completed);
    assert_eq!(slow_item.status, Status::Completed);
    assert_eq!(
        slow_item.output_path().and_then(|p| p.extension()),
        Some(std::ffi::OsStr::new("webm"))
    );
}

#[tokio::test]
async fn test_failure_of_one_item_does_not_affect_another() {
    let (downloader, fetcher, temp_dir) = create_downloader().await;
    let dir = temp_dir.path().join("downloads");
    fetcher.script(
        "https://www.youtube.com/watch?v=broken",
        Script::Fail {
            message: "ERROR: [youtube] broken: Video unavailable",
        },
    );
    fetcher.script(
        "https://www.youtube.com/watch?v=gated",
        Script::Gate { ext: "mp4" },
    );

    let broken = downloader
        .add_url("https://www.youtube.com/watch?v=broken", video(), &dir)
        .await
        .unwrap();
    let gated = downloader
        .add_url("https://www.youtube.com/watch?v=gated", video(), &dir)
        .await
        .unwrap();

    let mut events = downloader.subscribe();
    downloader.start(gated).await.unwrap();
    downloader.start(broken).await.unwrap();

    match wait_for_terminal(&mut events, broken, TIMEOUT).await {
        WaitResult::Failed(error) => assert!(error.contains("Video unavailable"), "{error}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(
        downloader.item(gated).await.unwrap().status,
        Status::Downloading
    );

    fetcher.open_gate();
    assert_item_completed(&mut events, gated, TIMEOUT).await;
    assert_eq!(downloader.item(broken).await.unwrap().status, Status::Failed);
}

#[tokio::test]
async fn test_concurrency_cap_serializes_fetches() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    config.download.max_concurrent_downloads = Some(1);
    let (downloader, fetcher, temp_dir) = create_downloader_with_config(config, temp_dir).await;
    let dir = temp_dir.path().join("downloads");

    for name in ["one", "two"] {
        fetcher.script(
            &format!("https://www.youtube.com/watch?v={name}"),
            Script::Gate { ext: "mp4" },
        );
    }
    let one = downloader
        .add_url("https://www.youtube.com/watch?v=one", video(), &dir)
        .await
        .unwrap();
    let two = downloader
        .add_url("https://www.youtube.com/watch?v=two", video(), &dir)
        .await
        .unwrap();

    let mut events = downloader.subscribe();
    downloader.start(one).await.unwrap();
    downloader.start(two).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(
        downloader.item(two).await.unwrap().status,
        Status::Downloading,
        "an item waiting for a slot still reads as downloading"
    );

    fetcher.open_gate();
    assert_item_completed(&mut events, one, TIMEOUT).await;
    assert_item_completed(&mut events, two, TIMEOUT).await;
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 2);
}
