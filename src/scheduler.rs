//! # Scheduler Module
//!
//! Implements the request scheduler that sits between the crawler loop and the
//! pending-request queue.
//!
//! ## Overview
//!
//! The `Scheduler` is thin: every request handed to it is stored
//! in a [`PendingQueue`] and handed back out in priority order. No duplicate
//! detection is performed, so a URL produced twice is fetched twice.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_engine::{Request, Scheduler};
//!
//! let scheduler = Scheduler::default();
//! scheduler.enqueue_request(Request::get("https://example.com")?);
//! let next = scheduler.next_request().await;
//! assert!(scheduler.is_idle());
//! ```

use crate::queue::{DEFAULT_QUEUE_WAIT, PendingQueue};
use crate::request::Request;
use std::time::Duration;
use tracing::trace;

/// Hands out scheduled requests in priority order.
pub struct Scheduler {
    queue: PendingQueue,
}

impl Scheduler {
    /// Creates a scheduler whose `next_request` waits at most `queue_wait`.
    pub fn new(queue_wait: Duration) -> Self {
        Scheduler {
            queue: PendingQueue::new(queue_wait),
        }
    }

    /// Enqueues a new request to be processed.
    pub fn enqueue_request(&self, request: Request) {
        trace!("Enqueuing request: {} (priority {})", request.url, request.priority);
        self.queue.put(request);
    }

    /// Returns the next request, or `None` if none arrived within the bounded wait.
    pub async fn next_request(&self) -> Option<Request> {
        let request = self.queue.get().await;
        if let Some(request) = &request {
            trace!("Dequeued request: {}", request.url);
        }
        request
    }

    /// Returns the number of pending requests in the scheduler.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if the scheduler is idle (has no pending requests).
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_WAIT)
    }
}
