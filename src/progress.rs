//! Progress coalescing and human-readable formatting
//!
//! The extraction tool reports progress many times per second. A
//! [`ProgressReporter`] lives inside each worker, turns raw byte counts into a
//! percentage plus speed/ETA text, and only lets an update through once per
//! configured interval. The sample that reaches 100% is always forwarded.

use std::time::{Duration, Instant};

use crate::fetcher::{FetchPhase, FetchProgress};

/// A coalesced, UI-facing progress update
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Percentage in [0, 100], `None` while the total size is unknown
    pub percent: Option<f32>,
    /// Transfer speed in bytes per second
    pub speed_bps: Option<u64>,
    /// Seconds remaining
    pub eta_secs: Option<u64>,
    /// Human-readable status line
    pub status: String,
}

/// Per-worker throttle for raw progress samples
#[derive(Debug)]
pub struct ProgressReporter {
    interval: Duration,
    started: Instant,
    last_emit: Option<Instant>,
}

impl ProgressReporter {
    /// Create a reporter that forwards at most one update per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: Instant::now(),
            last_emit: None,
        }
    }

    /// Feed one raw sample; returns an update when one is due
    pub fn sample(&mut self, progress: &FetchProgress) -> Option<ProgressUpdate> {
        self.sample_at(progress, Instant::now())
    }

    fn sample_at(&mut self, progress: &FetchProgress, now: Instant) -> Option<ProgressUpdate> {
        if progress.phase != FetchPhase::Downloading {
            return None;
        }

        let percent = percent_of(progress.downloaded_bytes, progress.total_bytes);
        let reached_end = percent.is_some_and(|p| p >= 100.0);
        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if !due && !reached_end {
            return None;
        }
        self.last_emit = Some(now);

        let speed_bps = progress
            .speed_bps
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| s as u64);

        Some(ProgressUpdate {
            percent,
            speed_bps,
            eta_secs: progress.eta_secs,
            status: status_line(
                percent,
                speed_bps,
                progress.eta_secs,
                Some(now.saturating_duration_since(self.started)),
            ),
        })
    }
}

/// Status line for a progress update
///
/// With a known percentage: `DL: 42% | 1.5 MB/s | ETA: 0:35`. Without one:
/// `Downloading | 1.5 MB/s | elapsed 0:12` (the elapsed part only when given).
pub fn status_line(
    percent: Option<f32>,
    speed_bps: Option<u64>,
    eta_secs: Option<u64>,
    elapsed: Option<Duration>,
) -> String {
    let speed = speed_bps.map_or_else(|| "N/A".to_string(), format_speed);
    match (percent, elapsed) {
        (Some(p), _) => format!(
            "DL: {:.0}% | {} | ETA: {}",
            p,
            speed,
            eta_secs.map_or_else(|| "N/A".to_string(), format_duration)
        ),
        (None, Some(elapsed)) => format!(
            "Downloading | {} | elapsed {}",
            speed,
            format_duration(elapsed.as_secs())
        ),
        (None, None) => format!("Downloading | {speed}"),
    }
}

/// `downloaded / total * 100`, clamped to [0, 100]; `None` when the total is unknown
pub fn percent_of(downloaded: u64, total: Option<u64>) -> Option<f32> {
    match total {
        Some(total) if total > 0 => {
            Some(((downloaded as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32)
        }
        _ => None,
    }
}

/// Format a byte count as B / KB / MB / GB
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{:.2} GB", b / GB)
    }
}

/// Format a transfer rate
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

/// Format seconds as `M:SS`, or `H:MM:SS` past the hour
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
