//! Pending queue: submitted tasks waiting for their key to become free.
//!
//! Producers append under a short lock. The dispatcher takes the whole
//! queue as a snapshot, scans it without holding the lock, and merges the
//! unclaimed remainder back in front of anything that arrived meanwhile, so
//! no entry is lost or duplicated and submission order is kept.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::task::Job;

#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append jobs in order, as one unit with respect to other producers.
    pub fn extend(&self, jobs: impl IntoIterator<Item = Job>) {
        self.jobs.lock().extend(jobs);
    }

    /// Remove every queued job for scanning.
    pub fn take_snapshot(&self) -> VecDeque<Job> {
        std::mem::take(&mut *self.jobs.lock())
    }

    /// Put unclaimed jobs back ahead of jobs enqueued since the snapshot.
    pub fn restore(&self, mut remaining: VecDeque<Job>) {
        if remaining.is_empty() {
            return;
        }
        let mut jobs = self.jobs.lock();
        remaining.append(&mut jobs);
        *jobs = remaining;
    }

    /// Drop every queued job (each resolves as abandoned).
    pub fn clear(&self) -> usize {
        let dropped = std::mem::take(&mut *self.jobs.lock());
        dropped.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }
}
