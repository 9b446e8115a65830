//! The unit of work run for every scheduled request.
//!
//! A unit fetches its request, hands the response to the request's own
//! callback (or the spider's `parse`), and forwards each output to the
//! router as soon as the callback produces it. The first error the callback
//! yields ends the unit; errors that invalidate the whole crawl are recorded
//! so the engine loop can stop admitting work.

use crate::crawler::OutputRouter;
use crate::downloader::Fetcher;
use crate::error::SpiderError;
use crate::request::Request;
use crate::spider::Spider;
use crate::stats::StatCollector;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Everything a unit needs, shared between the engine and its units.
pub(crate) struct UnitContext<S: Spider> {
    pub(crate) spider: Arc<S>,
    pub(crate) fetcher: Fetcher,
    pub(crate) router: OutputRouter,
    pub(crate) stats: Arc<StatCollector>,
    fatal: Mutex<Option<SpiderError>>,
}

impl<S: Spider> UnitContext<S> {
    pub(crate) fn new(
        spider: Arc<S>,
        fetcher: Fetcher,
        router: OutputRouter,
        stats: Arc<StatCollector>,
    ) -> Self {
        UnitContext {
            spider,
            fetcher,
            router,
            stats,
            fatal: Mutex::new(None),
        }
    }

    /// Keeps the first fatal error; later ones are only logged.
    pub(crate) fn record_fatal(&self, err: SpiderError) {
        let mut slot = self.fatal.lock();
        if slot.is_none() {
            *slot = Some(err);
        } else {
            debug!("Fatal error already recorded, dropping: {}", err);
        }
    }

    pub(crate) fn has_fatal(&self) -> bool {
        self.fatal.lock().is_some()
    }

    pub(crate) fn take_fatal(&self) -> Option<SpiderError> {
        self.fatal.lock().take()
    }
}

pub(crate) async fn process_request<S: Spider>(ctx: Arc<UnitContext<S>>, request: Request) {
    let callback = request.callback.clone();
    let Some(response) = ctx.fetcher.fetch(request).await else {
        return;
    };
    trace!("Processing response {}", response);

    let url = response.url.clone();
    let outputs = match callback {
        Some(callback) => callback.call(response),
        None => ctx.spider.parse(response),
    };

    let mut stream = outputs.into_stream();
    while let Some(next) = stream.next().await {
        match next {
            Ok(output) => ctx.router.enqueue(output).await,
            Err(err) if err.is_fatal() => {
                error!("Callback for {} produced a fatal error: {}", url, err);
                ctx.record_fatal(err);
                return;
            }
            Err(err) => {
                error!("Callback for {} failed: {}", url, err);
                ctx.stats.increment_callback_errors();
                return;
            }
        }
    }
}
