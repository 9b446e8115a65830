//! Priority-ordered storage for pending requests.
//!
//! Lower `priority` values come out first; requests with equal priority come
//! out in the order they were put. Retrieval waits for a bounded interval so
//! the crawler loop regains control periodically even while the queue stays
//! empty, and a `put` wakes a waiting `get` immediately.

use crate::request::Request;
use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default bounded wait of [`PendingQueue::get`].
pub const DEFAULT_QUEUE_WAIT: Duration = Duration::from_millis(100);

struct Entry {
    key: Reverse<(i32, u64)>,
    request: Request,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Pending requests ordered by priority, then by insertion order.
///
/// `put` never blocks. `get` waits at most the configured interval and
/// returns `None` if nothing arrived in time.
///
/// ```
/// use spider_engine::Request;
/// use spider_engine::queue::PendingQueue;
///
/// let queue = PendingQueue::default();
/// queue.put(Request::get("https://example.com/later").unwrap().with_priority(5));
/// queue.put(Request::get("https://example.com/sooner").unwrap().with_priority(1));
///
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.try_get().unwrap().url.path(), "/sooner");
/// ```
pub struct PendingQueue {
    heap: Mutex<BinaryHeap<Entry>>,
    sequence: AtomicU64,
    notify: Notify,
    wait: Duration,
}

impl PendingQueue {
    /// Creates an empty queue whose `get` waits at most `wait`.
    pub fn new(wait: Duration) -> Self {
        PendingQueue {
            heap: Mutex::new(BinaryHeap::new()),
            sequence: AtomicU64::new(0),
            notify: Notify::new(),
            wait,
        }
    }

    /// Adds a request. Never blocks and never fails.
    pub fn put(&self, request: Request) {
        let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().push(Entry {
            key: Reverse((request.priority, sequence)),
            request,
        });
        self.notify.notify_one();
    }

    /// Removes the highest-priority request without waiting.
    pub fn try_get(&self) -> Option<Request> {
        self.heap.lock().pop().map(|entry| entry.request)
    }

    /// Waits up to the bounded interval for a request, `None` on timeout.
    pub async fn get(&self) -> Option<Request> {
        let deadline = Instant::now() + self.wait;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent put cannot slip between the two.
            notified.as_mut().enable();

            if let Some(request) = self.try_get() {
                return Some(request);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_get();
            }
        }
    }

    /// Number of requests waiting.
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_WAIT)
    }
}
