//! The core Crawler implementation.
//!
//! `Crawler` ties together the scheduler, the fetcher, the task controller
//! and the output router. Its loop pulls the next request, spawns a unit of
//! work for it under a concurrency permit, and falls back to the spider's
//! seed source whenever the scheduler runs dry. Once the seeds are used up
//! the loop checks after every empty wait whether the whole engine is idle,
//! and stops when it is.

use crate::concurrency::TaskController;
use crate::crawler::request_handler::{UnitContext, process_request};
use crate::error::SpiderError;
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::spider::{Spider, StartRequests};
use crate::state::EngineState;
use crate::stats::StatCollector;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// The central orchestrator of one crawl run.
pub struct Crawler<S: Spider> {
    scheduler: Arc<Scheduler>,
    tasks: TaskController,
    ctx: Arc<UnitContext<S>>,
    settings: Settings,
    state: Mutex<EngineState>,
    handle_ctrl_c: bool,
}

impl<S: Spider> Crawler<S> {
    pub(crate) fn new(
        scheduler: Arc<Scheduler>,
        ctx: UnitContext<S>,
        settings: Settings,
        handle_ctrl_c: bool,
    ) -> Self {
        Crawler {
            scheduler,
            tasks: TaskController::new(settings.concurrency),
            ctx: Arc::new(ctx),
            settings,
            state: Mutex::new(EngineState::Stopped),
            handle_ctrl_c,
        }
    }

    /// Runs the crawl until the engine is idle, a fatal error is recorded or
    /// Ctrl-C is received, then closes the engine.
    ///
    /// Returns the first fatal error a unit recorded, if any. Calling this on
    /// an engine that has already started fails with `InvalidState`.
    pub async fn start_crawl(&self) -> Result<(), SpiderError> {
        {
            let mut state = self.state.lock();
            if !state.can_start() {
                return Err(SpiderError::InvalidState(format!(
                    "start_crawl called on a {} engine",
                    *state
                )));
            }
            *state = EngineState::Running;
        }

        info!(
            "Crawler starting spider '{}' with downloader={}, concurrency={}",
            self.ctx.spider.name(),
            self.ctx.fetcher.name(),
            self.tasks.limit()
        );

        if self.handle_ctrl_c {
            tokio::select! {
                _ = wait_for_ctrl_c() => {
                    info!("Ctrl-C received, stopping admission of new work.");
                }
                _ = self.run() => {}
            }
        } else {
            self.run().await;
        }

        if !self.tasks.all_done() {
            debug!("Waiting for {} running units", self.tasks.active());
        }
        if let Err(e) = self.tasks.wait_all().await {
            error!("Failed to wait for running units: {}", e);
        }

        self.close().await;

        match self.ctx.take_fatal() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run(&self) {
        let mut seeds: Option<StartRequests> = Some(self.ctx.spider.start_requests());

        loop {
            if self.ctx.has_fatal() {
                warn!("Fatal error recorded, stopping admission of new work.");
                break;
            }

            if let Some(request) = self.scheduler.next_request().await {
                let permit = match self.tasks.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!("Could not acquire a task permit: {}", e);
                        self.ctx.record_fatal(e);
                        break;
                    }
                };
                trace!("Spawning unit for {}", request);
                self.tasks
                    .spawn(permit, process_request(Arc::clone(&self.ctx), request));
                continue;
            }

            match seeds.as_mut().map(|source| source.next()) {
                Some(Some(Ok(request))) => {
                    trace!("Enqueueing seed request {}", request);
                    self.scheduler.enqueue_request(request);
                    self.ctx.stats.increment_requests_enqueued();
                    continue;
                }
                Some(Some(Err(e))) => {
                    error!("Seed source failed, no further seeds will be read: {}", e);
                    seeds = None;
                }
                Some(None) => {
                    debug!("Seed source exhausted");
                    seeds = None;
                }
                None => {}
            }

            if self.tasks.all_done() && !self.ctx.router.is_empty() {
                // A unit died mid-drain and nobody is left to push its leftovers.
                warn!(
                    "{} outputs left behind by a failed drain, resuming routing",
                    self.ctx.router.len()
                );
                let permit = match self.tasks.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        self.ctx.record_fatal(e);
                        break;
                    }
                };
                let ctx = Arc::clone(&self.ctx);
                self.tasks.spawn(permit, async move { ctx.router.drain().await });
                continue;
            }

            if seeds.is_none() && self.is_idle() {
                info!("Crawl has become idle, initiating shutdown.");
                break;
            }
        }
    }

    /// True when no unit runs, no request is in flight, nothing is scheduled
    /// and the router holds no pending output.
    ///
    /// Units are checked first: only units feed the scheduler and the router
    /// after the seeds are exhausted, so once none is running the remaining
    /// checks cannot be invalidated concurrently.
    pub fn is_idle(&self) -> bool {
        self.tasks.all_done()
            && self.ctx.fetcher.is_idle()
            && self.ctx.router.is_idle()
            && self.scheduler.is_idle()
    }

    async fn close(&self) {
        debug!("Closing downloader '{}'", self.ctx.fetcher.name());
        self.ctx.fetcher.close().await;
        self.ctx.router.close().await;
        *self.state.lock() = EngineState::Closed;

        if !self.scheduler.is_empty() {
            warn!("{} scheduled requests were never fetched", self.scheduler.len());
        }
        info!(
            "Crawl of '{}' finished.{}",
            self.ctx.spider.name(),
            self.ctx.stats
        );
    }

    pub fn spider_name(&self) -> &str {
        self.ctx.spider.name()
    }

    /// Current lifecycle state of the engine.
    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// The resolved settings this crawler runs with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns a cloned Arc to the `StatCollector` instance used by this crawler.
    ///
    /// This allows programmatic access to the collected statistics at any time during or after the crawl.
    pub fn get_stats(&self) -> Arc<StatCollector> {
        Arc::clone(&self.ctx.stats)
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
