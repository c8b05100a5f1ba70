use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

/// Handle for fire-and-forget work dispatched off the request path.
///
/// Cache population and audit lines run here. The request path never awaits
/// them, but tests can `settle` and shutdown can drain.
#[derive(Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
}

impl BackgroundTasks {
    /// Creates a new `BackgroundTasks` running at most `limit` tasks at once.
    pub fn new(limit: usize) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(limit.max(1))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Dispatches `task` without waiting for it.
    ///
    /// Tasks beyond the concurrency limit queue for a permit. There is no
    /// cancellation: a dispatched task completes or fails on its own.
    /// After `shutdown` the task is dropped without running.
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!("Background task '{}' dropped: shutting down", label);
            return;
        }
        let permits = self.permits.clone();
        self.tracker.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!("Background task '{}' dropped: pool closed", label);
                return;
            };
            task.await;
            tracing::trace!("Background task '{}' finished", label);
        });
    }

    /// Number of dispatched tasks that have not finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every task dispatched so far has finished.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stops accepting new work and waits up to `grace` for in-flight tasks.
    pub async fn shutdown(&self, grace: Duration) {
        self.closed.store(true, Ordering::Release);
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                "⚠️  {} background tasks still running after {:?}",
                self.tracker.len(),
                grace
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn settle_waits_for_dispatched_tasks() {
        let tasks = BackgroundTasks::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let done = done.clone();
            tasks.spawn("count", async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(tasks.in_flight(), 0);

        // still usable after settling
        let done2 = done.clone();
        tasks.spawn("again", async move {
            done2.fetch_add(1, Ordering::SeqCst);
        });
        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn limit_bounds_concurrency() {
        let tasks = BackgroundTasks::new(1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let running = running.clone();
            let peak = peak.clone();
            tasks.spawn("bounded", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        tasks.settle().await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn spawn_after_shutdown_is_dropped() {
        let tasks = BackgroundTasks::new(2);
        tasks.shutdown(Duration::from_millis(50)).await;

        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        tasks.spawn("late", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(tasks.in_flight(), 0);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0);
    }
}
