//! Routing of callback outputs.
//!
//! Units of work push their outputs into one FIFO. Whoever pushes also tries
//! to drain it, but only one drain pass runs at a time: a producer that finds
//! a drain in progress leaves its output to that drainer. After releasing the
//! drain lock the drainer looks at the FIFO once more, which closes the
//! window where an output lands just as the previous pass finishes.
//!
//! A sink that panics takes down the unit running the pass. The pass guard
//! still clears the draining flag and releases the lock on unwind; outputs
//! queued behind the failed one are picked up by the next drain, which the
//! crawler loop starts itself once no unit is left to do it.

use crate::output::Output;
use crate::scheduler::Scheduler;
use crate::sink::ItemSink;
use crate::stats::StatCollector;
use crossbeam::queue::SegQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

/// Marks a drain pass as running for as long as it holds the drain lock.
struct DrainPass<'a> {
    draining: &'a AtomicBool,
    _lock: MutexGuard<'a, ()>,
}

impl<'a> DrainPass<'a> {
    fn begin(draining: &'a AtomicBool, lock: MutexGuard<'a, ()>) -> Self {
        draining.store(true, Ordering::SeqCst);
        DrainPass {
            draining,
            _lock: lock,
        }
    }
}

impl Drop for DrainPass<'_> {
    fn drop(&mut self) {
        // Cleared before `_lock` is released.
        self.draining.store(false, Ordering::SeqCst);
    }
}

/// Serialises callback outputs: requests go back to the scheduler, items go
/// to every sink in registration order.
pub struct OutputRouter {
    queue: SegQueue<Output>,
    drain_lock: Mutex<()>,
    draining: AtomicBool,
    scheduler: Arc<Scheduler>,
    sinks: Vec<Box<dyn ItemSink>>,
    stats: Arc<StatCollector>,
}

impl OutputRouter {
    /// Creates a router with an empty FIFO feeding `scheduler` and `sinks`.
    pub fn new(
        scheduler: Arc<Scheduler>,
        sinks: Vec<Box<dyn ItemSink>>,
        stats: Arc<StatCollector>,
    ) -> Self {
        OutputRouter {
            queue: SegQueue::new(),
            drain_lock: Mutex::new(()),
            draining: AtomicBool::new(false),
            scheduler,
            sinks,
            stats,
        }
    }

    /// Appends `output` and makes sure a drain pass handles it.
    pub async fn enqueue(&self, output: Output) {
        self.queue.push(output);
        self.drain().await;
    }

    /// Runs drain passes until the FIFO is empty, unless another pass is
    /// already active.
    pub(crate) async fn drain(&self) {
        loop {
            let Ok(lock) = self.drain_lock.try_lock() else {
                trace!("Drain pass already active, leaving output to it");
                return;
            };
            let pass = DrainPass::begin(&self.draining, lock);
            while let Some(output) = self.queue.pop() {
                self.dispatch(output).await;
            }
            drop(pass);

            if self.queue.is_empty() {
                return;
            }
        }
    }

    async fn dispatch(&self, output: Output) {
        match output {
            Output::Request(request) => {
                trace!("Routing request to scheduler: {}", request.url);
                self.scheduler.enqueue_request(request);
                self.stats.increment_requests_enqueued();
            }
            Output::Item(item) => {
                self.stats.increment_items_scraped();
                if let Some((last, rest)) = self.sinks.split_last() {
                    for sink in rest {
                        trace!("Routing item to sink '{}'", sink.name());
                        sink.accept(item.clone()).await;
                    }
                    trace!("Routing item to sink '{}'", last.name());
                    last.accept(item).await;
                }
            }
        }
    }

    /// True when nothing is queued and no drain pass is running.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && !self.draining.load(Ordering::SeqCst)
    }

    /// Number of outputs waiting for a drain pass.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when no output waits in the FIFO. A drain pass may still be running.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) async fn close(&self) {
        for sink in &self.sinks {
            debug!("Closing item sink '{}'", sink.name());
            sink.close().await;
        }
    }
}
