//! # Builder Module
//!
//! Provides the `CrawlerBuilder`, a fluent API for constructing and configuring
//! `Crawler` instances.
//!
//! ## Overview
//!
//! The builder starts from default [`Settings`], lays the spider's
//! `custom_settings` over them, and finally applies anything set explicitly
//! on the builder. The result is validated before any component is created.
//!
//! ## Key Features
//!
//! - **Concurrency Configuration**: bound the number of units in flight
//! - **Component Registration**: attach a custom downloader and item sinks
//! - **Default Handling**: a reqwest downloader and a logging sink when none are given
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::{ChannelSink, CrawlerBuilder};
//!
//! async fn setup_crawler() -> Result<(), SpiderError> {
//!     let (sink, mut items) = ChannelSink::new();
//!     let crawler = CrawlerBuilder::new(MySpider)
//!         .concurrency(8)
//!         .add_sink(sink)
//!         .build()?;
//!
//!     crawler.start_crawl().await
//! }
//! ```

use crate::crawler::{Crawler, OutputRouter, UnitContext};
use crate::downloader::{Downloader, Fetcher, build_downloader};
use crate::error::SpiderError;
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::sink::{ItemSink, LogSink};
use crate::spider::Spider;
use crate::stats::StatCollector;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Assembles a [`Crawler`] from a spider, settings, a downloader and item sinks.
pub struct CrawlerBuilder<S: Spider> {
    spider: S,
    settings: Settings,
    concurrency: Option<usize>,
    queue_wait: Option<Duration>,
    downloader: Option<Box<dyn Downloader>>,
    sinks: Vec<Box<dyn ItemSink>>,
    handle_ctrl_c: bool,
}

impl<S: Spider> CrawlerBuilder<S> {
    /// Creates a new `CrawlerBuilder` for a given spider with default settings.
    pub fn new(spider: S) -> Self {
        CrawlerBuilder {
            spider,
            settings: Settings::default(),
            concurrency: None,
            queue_wait: None,
            downloader: None,
            sinks: Vec::new(),
            handle_ctrl_c: true,
        }
    }

    /// Replaces the base settings. The spider's `custom_settings` still apply on top.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the maximum number of concurrent units.
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    /// Sets how long the engine loop waits for a request before re-checking idleness.
    pub fn queue_wait(mut self, wait: Duration) -> Self {
        self.queue_wait = Some(wait);
        self
    }

    /// Uses `downloader` instead of the one selected by `DOWNLOADER`.
    pub fn downloader<D: Downloader>(mut self, downloader: D) -> Self {
        self.downloader = Some(Box::new(downloader));
        self
    }

    /// Adds an item sink. Items are delivered to every sink, in the order added.
    pub fn add_sink<K: ItemSink>(mut self, sink: K) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Whether Ctrl-C stops the crawl gracefully. Enabled by default.
    pub fn handle_ctrl_c(mut self, enabled: bool) -> Self {
        self.handle_ctrl_c = enabled;
        self
    }

    fn resolve_settings(&self) -> Result<Settings, SpiderError> {
        let mut settings = self.settings.clone();
        if let Some(overrides) = self.spider.custom_settings() {
            debug!("Applying custom settings of spider '{}'", self.spider.name());
            settings.merge(&overrides)?;
        }
        if let Some(limit) = self.concurrency {
            settings.concurrency = limit;
        }
        if let Some(wait) = self.queue_wait {
            settings.queue_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Builds the `Crawler`, opening its downloader.
    pub fn build(self) -> Result<Crawler<S>, SpiderError> {
        let settings = self.resolve_settings()?;

        let downloader = match self.downloader {
            Some(downloader) => downloader,
            None => build_downloader(&settings)?,
        };

        let mut sinks = self.sinks;
        if sinks.is_empty() {
            sinks.push(Box::new(LogSink));
        }

        let stats = Arc::new(StatCollector::new());
        let scheduler = Arc::new(Scheduler::new(settings.queue_wait()));
        let fetcher = Fetcher::new(downloader, Arc::clone(&stats))?;
        let router = OutputRouter::new(Arc::clone(&scheduler), sinks, Arc::clone(&stats));
        let ctx = UnitContext::new(Arc::new(self.spider), fetcher, router, stats);

        Ok(Crawler::new(scheduler, ctx, settings, self.handle_ctrl_c))
    }
}
