use super::test_helpers::*;
use super::*;
use crate::types::{Event, FormatRequest, MediaKind, Quality, Status};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;


/// Drain every event currently buffered on `rx`
fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
