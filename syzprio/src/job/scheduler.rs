//! Priority scheduler over [`Job`]s.
//!
//! A `BinaryHeap` ordered so the lowest `(base_priority, creation_id)`
//! tuple pops first — smash jobs (priority 1) always run ahead of
//! generate (2), triage (3), candidate (4) and candidate-triage (5)
//! jobs, and within a priority band, older jobs run before newer ones.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::Job;

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.creation_id == other.creation_id
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) surfaces the numerically
        // smallest priority, then the smallest (oldest) creation ID.
        other
            .kind
            .base_priority()
            .cmp(&self.kind.base_priority())
            .then_with(|| other.creation_id.cmp(&self.creation_id))
    }
}

/// Thread-safe priority queue plus a monotonic creation-ID counter.
pub struct Scheduler {
    heap: Mutex<BinaryHeap<Job>>,
    next_id: AtomicU64,
    notify: Notify,
    cancelled: std::sync::atomic::AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            next_id: AtomicU64::new(0),
            notify: Notify::new(),
            cancelled: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Allocates the next creation ID for a new job.
    pub fn next_creation_id(&self) -> u64 {
        self.next_id.fetch_add(1, AtomicOrdering::Relaxed)
    }

    pub fn submit(&self, job: Job) {
        self.heap.lock().push(job);
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    fn try_pop(&self) -> Option<Job> {
        self.heap.lock().pop()
    }

    /// Waits for and pops the highest-priority job, or returns `None` if
    /// the scheduler has been cancelled.
    pub async fn next(&self) -> Option<Job> {
        loop {
            if let Some(job) = self.try_pop() {
                return Some(job);
            }
            if self.cancelled.load(AtomicOrdering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Cooperative cancellation: wakes every waiter, after which
    /// `next()` returns `None` once the queue drains.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
