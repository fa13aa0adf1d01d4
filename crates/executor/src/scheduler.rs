use log::trace;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Matches the per-origin connection limit browsers apply.
pub const DEFAULT_CONCURRENCY: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Request scheduler has been shut down")]
    Closed,
}

/// A bounded-concurrency FIFO scheduler.
///
/// Admission is FIFO because the underlying tokio semaphore is fair: waiters
/// acquire permits in the order they started waiting. Completion order is
/// whatever the running tasks produce. There are no priorities and a running
/// task is never preempted.
///
/// Cloning is cheap; clones share the same budget and counters.
#[derive(Clone, Debug)]
pub struct RequestScheduler {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    budget: usize,
    slots: Semaphore,
    in_use: AtomicUsize,
    queued: AtomicUsize,
    peak: AtomicUsize,
    admitted_total: AtomicU64,
}

impl RequestScheduler {
    /// Creates a scheduler admitting at most `budget` concurrent tasks.
    /// A budget of zero is treated as one so scheduled work can always progress.
    pub fn new(budget: usize) -> Self {
        let budget = budget.max(1);
        Self {
            inner: Arc::new(Inner {
                budget,
                slots: Semaphore::new(budget),
                in_use: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                admitted_total: AtomicU64::new(0),
            }),
        }
    }

    /// Runs `task` once a slot is free and returns its output.
    ///
    /// The slot is released when the task finishes, whether it succeeded,
    /// failed, or the returned future was dropped mid-flight; the next queued
    /// task is admitted at that point.
    pub async fn schedule<F, T>(&self, task: F) -> Result<T, SchedulerError>
    where
        F: Future<Output = T>,
    {
        let admission = {
            let _waiting = QueueGuard::enter(&self.inner);
            let permit = self
                .inner
                .slots
                .acquire()
                .await
                .map_err(|_| SchedulerError::Closed)?;
            Admission::new(&self.inner, permit)
        };

        let output = task.await;
        drop(admission);
        Ok(output)
    }

    /// Rejects every queued and future task. Running tasks finish normally.
    pub fn shutdown(&self) {
        self.inner.slots.close();
    }

    pub fn budget(&self) -> usize {
        self.inner.budget
    }

    /// Number of tasks currently admitted and running.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Number of tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously running tasks seen so far.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Acquire)
    }

    pub fn admitted_total(&self) -> u64 {
        self.inner.admitted_total.load(Ordering::Acquire)
    }
}

impl Default for RequestScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

/// Counts a task as queued for as long as it waits for a slot, including
/// when it gives up waiting because its future was dropped.
struct QueueGuard<'a> {
    inner: &'a Inner,
}

impl<'a> QueueGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let depth = inner.queued.fetch_add(1, Ordering::AcqRel) + 1;
        if inner.slots.available_permits() == 0 {
            trace!("Scheduler saturated, {} task(s) queued", depth);
        }
        Self { inner }
    }
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.inner.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A held slot. Releasing the permit admits the next queued task.
struct Admission<'a> {
    inner: &'a Inner,
    _permit: SemaphorePermit<'a>,
}

impl<'a> Admission<'a> {
    fn new(inner: &'a Inner, permit: SemaphorePermit<'a>) -> Self {
        let running = inner.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        inner.peak.fetch_max(running, Ordering::AcqRel);
        inner.admitted_total.fetch_add(1, Ordering::AcqRel);
        Self {
            inner,
            _permit: permit,
        }
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}
