//! # Statistics Module
//!
//! Counters describing one crawl run.
//!
//! The `StatCollector` is shared by the fetcher, the output router and the
//! crawler loop, which bump its counters without locking. Readers never look
//! at the live counters directly: [`StatCollector::snapshot`] copies them
//! into a plain [`StatsSnapshot`] that can be printed or serialized.
//!
//! ## Example
//!
//! ```rust,ignore
//! let stats = crawler.get_stats().snapshot();
//! println!("{}", stats);
//! println!("{}", serde_json::to_string_pretty(&stats)?);
//! ```

use crate::error::SpiderError;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A copy of every counter at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub requests_enqueued: usize,
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    /// Fetches that produced no response.
    pub requests_failed: usize,
    pub bytes_downloaded: usize,
    pub items_scraped: usize,
    /// Units that stopped because their callback yielded an error.
    pub callback_errors: usize,
    pub status_counts: BTreeMap<u16, usize>,
}

impl StatsSnapshot {
    /// Sent requests per second of elapsed time, 0 before any time has passed.
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests_sent as f64 / secs
        } else {
            0.0
        }
    }
}

fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "  elapsed   {:.2?} ({:.2} req/s)", self.elapsed, self.requests_per_second())?;
        writeln!(
            f,
            "  requests  enqueued={} sent={} ok={} failed={}",
            self.requests_enqueued, self.requests_sent, self.requests_succeeded, self.requests_failed
        )?;
        writeln!(f, "  received  {}", human_bytes(self.bytes_downloaded))?;
        writeln!(
            f,
            "  items     scraped={} callback_errors={}",
            self.items_scraped, self.callback_errors
        )?;
        write!(f, "  status   ")?;
        if self.status_counts.is_empty() {
            write!(f, " none")?;
        }
        for (code, count) in &self.status_counts {
            write!(f, " {}={}", code, count)?;
        }
        writeln!(f)
    }
}

/// Live counters of a crawl.
#[derive(Debug)]
pub struct StatCollector {
    started: Instant,
    requests_enqueued: AtomicUsize,
    requests_sent: AtomicUsize,
    requests_succeeded: AtomicUsize,
    requests_failed: AtomicUsize,
    bytes_downloaded: AtomicUsize,
    items_scraped: AtomicUsize,
    callback_errors: AtomicUsize,
    status_counts: DashMap<u16, usize>,
}

impl StatCollector {
    pub fn new() -> Self {
        StatCollector {
            started: Instant::now(),
            requests_enqueued: AtomicUsize::new(0),
            requests_sent: AtomicUsize::new(0),
            requests_succeeded: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            bytes_downloaded: AtomicUsize::new(0),
            items_scraped: AtomicUsize::new(0),
            callback_errors: AtomicUsize::new(0),
            status_counts: DashMap::new(),
        }
    }

    /// Copies every counter into a [`StatsSnapshot`].
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            elapsed: self.started.elapsed(),
            requests_enqueued: self.requests_enqueued.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            items_scraped: self.items_scraped.load(Ordering::Relaxed),
            callback_errors: self.callback_errors.load(Ordering::Relaxed),
            status_counts: self
                .status_counts
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }

    pub(crate) fn increment_requests_enqueued(&self) {
        self.requests_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_requests_succeeded(&self) {
        self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_response_status(&self, status: u16) {
        *self.status_counts.entry(status).or_insert(0) += 1;
    }

    pub(crate) fn add_bytes_downloaded(&self, bytes: usize) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn increment_items_scraped(&self) {
        self.items_scraped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_callback_errors(&self) {
        self.callback_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// The current snapshot as compact JSON.
    pub fn to_json_string(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.snapshot().fmt(f)
    }
}
