//! Running several crawls side by side.
//!
//! A [`CrawlerProcess`] holds one set of process-wide settings. Every spider
//! added to it gets a crawler built from those settings plus its own
//! `custom_settings`, and all crawlers run concurrently on the current Tokio
//! runtime until each has finished.

use crate::builder::CrawlerBuilder;
use crate::crawler::Crawler;
use crate::error::SpiderError;
use crate::logging::init_logging;
use crate::settings::Settings;
use crate::spider::Spider;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Runs several crawlers side by side under one set of base settings.
pub struct CrawlerProcess {
    settings: Settings,
    crawls: Vec<(String, JoinHandle<Result<(), SpiderError>>)>,
}

impl CrawlerProcess {
    /// Creates a process and installs logging at `settings.log_level`.
    pub fn new(settings: Settings) -> Result<Self, SpiderError> {
        settings.validate()?;
        init_logging(&settings.log_level);
        Ok(CrawlerProcess {
            settings,
            crawls: Vec::new(),
        })
    }

    /// The base settings handed to every crawler started by [`CrawlerProcess::crawl`].
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Builds a crawler for `spider` and starts it.
    pub fn crawl<S: Spider>(&mut self, spider: S) -> Result<(), SpiderError> {
        let crawler = CrawlerBuilder::new(spider)
            .settings(self.settings.clone())
            .build()?;
        self.add_crawler(crawler);
        Ok(())
    }

    /// Starts a crawler that was configured separately.
    pub fn add_crawler<S: Spider>(&mut self, crawler: Crawler<S>) {
        let name = crawler.spider_name().to_string();
        info!("Starting crawl '{}'", name);
        let handle = tokio::spawn(async move { crawler.start_crawl().await });
        self.crawls.push((name, handle));
    }

    /// Number of crawls started and not yet joined.
    pub fn len(&self) -> usize {
        self.crawls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawls.is_empty()
    }

    /// Waits for every crawl. All crawls run to completion; the first error is returned.
    pub async fn join(self) -> Result<(), SpiderError> {
        let mut first_error = None;
        for (name, handle) in self.crawls {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(SpiderError::GeneralError(format!(
                    "crawl task panicked or was cancelled: {}",
                    e
                ))),
            };
            match outcome {
                Ok(()) => info!("Crawl '{}' finished", name),
                Err(e) => {
                    error!("Crawl '{}' failed: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
