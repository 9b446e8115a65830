//! Bounded-concurrency admission control for units of work.
//!
//! The [`TaskController`] owns a counting permit pool sized to the configured
//! concurrency limit and the set of units currently running. A unit can only
//! be spawned with a permit in hand, and the guard travelling with the unit
//! deregisters it and returns the permit however the unit ends: normal
//! completion, panic, or the task being dropped.

use crate::error::SpiderError;
use dashmap::DashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::trace;

/// Largest concurrency limit a [`TaskController`] can honour. Bounded by the
/// semaphore's permit capacity and by `wait_all`, which takes every permit in
/// one `u32`-sized request.
pub const MAX_CONCURRENCY: usize = if (u32::MAX as usize) < Semaphore::MAX_PERMITS {
    u32::MAX as usize
} else {
    Semaphore::MAX_PERMITS
};

/// Admits units of work up to a fixed limit and tracks which are running.
pub struct TaskController {
    limit: usize,
    semaphore: Arc<Semaphore>,
    tracked: Arc<DashSet<u64>>,
    next_id: AtomicU64,
}

/// Travels inside a spawned unit. Field order matters: the unit leaves the
/// tracked set in `drop` before the permit is released.
struct TaskGuard {
    id: u64,
    tracked: Arc<DashSet<u64>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tracked.remove(&self.id);
        trace!("Unit {} finished, releasing permit", self.id);
    }
}

impl TaskController {
    /// Creates a controller admitting at most `limit` concurrent units.
    ///
    /// `limit` must not exceed [`MAX_CONCURRENCY`]; `Settings::validate`
    /// rejects larger values before a crawler is built.
    pub fn new(limit: usize) -> Self {
        TaskController {
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            tracked: Arc::new(DashSet::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The configured concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Waits for a free permit.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, SpiderError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SpiderError::GeneralError("task permit pool is closed".into()))
    }

    /// Starts `work` as an independent unit holding `permit` until it ends.
    pub fn spawn<F>(&self, permit: OwnedSemaphorePermit, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tracked.insert(id);
        debug_assert!(
            self.tracked.len() <= self.limit,
            "more units tracked than permits exist"
        );
        trace!("Spawning unit {} ({} active)", id, self.tracked.len());

        let guard = TaskGuard {
            id,
            tracked: Arc::clone(&self.tracked),
            _permit: permit,
        };
        tokio::spawn(async move {
            let _guard = guard;
            work.await;
        })
    }

    /// True when no spawned unit is still running.
    pub fn all_done(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Number of units spawned and not yet finished.
    pub fn active(&self) -> usize {
        self.tracked.len()
    }

    /// Permits not currently held by a running unit.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits until every spawned unit has finished and released its permit.
    pub async fn wait_all(&self) -> Result<(), SpiderError> {
        let all = u32::try_from(self.limit).map_err(|_| {
            SpiderError::ConfigurationError(format!("concurrency limit {} is too large", self.limit))
        })?;
        let _permits = self
            .semaphore
            .acquire_many(all)
            .await
            .map_err(|_| SpiderError::GeneralError("task permit pool is closed".into()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_limit() {
        let controller = Arc::new(TaskController::new(3));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let permit = controller.acquire().await.unwrap();
            assert!(controller.active() < controller.limit());
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            controller.spawn(permit, async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
            assert!(controller.active() <= controller.limit());
        }

        controller.wait_all().await.unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(controller.all_done());
        assert_eq!(controller.available_permits(), 3);
    }

    #[tokio::test]
    async fn test_wait_all_at_max_concurrency() {
        let controller = TaskController::new(MAX_CONCURRENCY);
        assert_eq!(controller.available_permits(), MAX_CONCURRENCY);
        controller.wait_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_unit_releases_permit() {
        let controller = TaskController::new(1);
        let permit = controller.acquire().await.unwrap();
        let handle = controller.spawn(permit, async {
            panic!("unit failed");
        });

        assert!(handle.await.is_err());
        assert!(controller.all_done());
        assert_eq!(controller.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_aborted_unit_releases_permit() {
        let controller = TaskController::new(2);
        let permit = controller.acquire().await.unwrap();
        let handle = controller.spawn(permit, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert_eq!(controller.active(), 1);
        assert_eq!(controller.available_permits(), 1);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(controller.all_done());
        assert_eq!(controller.available_permits(), 2);
    }
}
