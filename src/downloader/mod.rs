//! # Downloader Module
//!
//! The contract every transport backend satisfies, and the [`Fetcher`] that
//! wraps a backend for the crawler.
//!
//! ## Overview
//!
//! A backend only has to turn a [`Request`] into a [`Response`]. It must
//! never let a transport failure escape: connection errors, timeouts and
//! protocol errors are logged and reported as `None`, and the request's
//! output chain is dropped.
//!
//! The [`Fetcher`] is shared by all backends. It records every request in an
//! in-flight set for the duration of the download and removes it again on
//! every exit path, so [`Fetcher::is_idle`] stays truthful even when a
//! backend panics.

mod http;

pub use self::http::ReqwestDownloader;

use crate::error::SpiderError;
use crate::request::Request;
use crate::response::Response;
use crate::settings::{DownloaderKind, Settings};
use crate::stats::StatCollector;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace};

/// A network transport able to fetch requests.
#[async_trait]
pub trait Downloader: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Called exactly once before the first download.
    fn open(&mut self) -> Result<(), SpiderError> {
        Ok(())
    }

    /// Fetches `request`. Transport failures are logged and become `None`.
    async fn download(&self, request: Arc<Request>) -> Option<Response>;

    /// Releases transport resources. Must be idempotent.
    async fn close(&self) {}
}

/// Builds the backend selected by `settings.downloader`.
pub fn build_downloader(settings: &Settings) -> Result<Box<dyn Downloader>, SpiderError> {
    match settings.downloader {
        DownloaderKind::Reqwest => Ok(Box::new(ReqwestDownloader::new(settings))),
    }
}

/// Requests currently inside a download, keyed by a per-fetch id.
#[derive(Debug, Default)]
pub struct ActiveRequests {
    next_id: AtomicU64,
    active: DashMap<u64, String>,
}

/// Removes its request from [`ActiveRequests`] when dropped.
pub struct ActiveGuard<'a> {
    id: u64,
    active: &'a DashMap<u64, String>,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

impl ActiveRequests {
    /// Registers `request` as in flight until the returned guard drops.
    pub fn track(&self, request: &Request) -> ActiveGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.active.insert(id, request.url.to_string());
        ActiveGuard {
            id,
            active: &self.active,
        }
    }

    /// Number of requests currently in flight.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// A backend plus in-flight tracking and download statistics.
pub struct Fetcher {
    downloader: Box<dyn Downloader>,
    active: ActiveRequests,
    closed: AtomicBool,
    stats: Arc<StatCollector>,
}

impl Fetcher {
    /// Opens `downloader` and wraps it.
    pub fn new(mut downloader: Box<dyn Downloader>, stats: Arc<StatCollector>) -> Result<Self, SpiderError> {
        downloader.open()?;
        debug!("Downloader '{}' opened", downloader.name());
        Ok(Fetcher {
            downloader,
            active: ActiveRequests::default(),
            closed: AtomicBool::new(false),
            stats,
        })
    }

    /// Name of the wrapped downloader.
    pub fn name(&self) -> &str {
        self.downloader.name()
    }

    /// Downloads `request`, keeping it in the in-flight set until the download ends.
    pub async fn fetch(&self, request: Request) -> Option<Response> {
        let request = Arc::new(request);
        let _active = self.active.track(&request);
        trace!("Downloading request for URL: {}", request.url);
        self.stats.increment_requests_sent();

        let start_time = Instant::now();
        let response = self.downloader.download(Arc::clone(&request)).await;
        let elapsed = start_time.elapsed();

        match &response {
            Some(resp) => {
                trace!("Download successful for URL: {}, took {:?}", resp.url, elapsed);
                self.stats.increment_requests_succeeded();
                self.stats.record_response_status(resp.status);
                self.stats.add_bytes_downloaded(resp.body.len());
            }
            None => {
                debug!("No response for URL: {}, took {:?}; dropping its outputs", request.url, elapsed);
                self.stats.increment_requests_failed();
            }
        }
        response
    }

    /// True when no download is in progress.
    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Number of fetches that have started and not yet returned.
    pub fn in_flight(&self) -> usize {
        self.active.len()
    }

    /// Closes the backend once; later calls do nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            trace!("Downloader '{}' already closed", self.name());
            return;
        }
        self.downloader.close().await;
        info!("Downloader '{}' closed", self.name());
    }
}
