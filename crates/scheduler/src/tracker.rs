//! Bookkeeping shared by submitters, the dispatcher and workers: how many
//! tasks are still outstanding, and the metrics they produce.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::debug;

use crate::metrics::SchedulerMetrics;
use crate::task::{JobReport, JobStatus};

/// Counts tasks from submission until they finish or are abandoned, and
/// lets drainers block until that count reaches zero.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    outstanding: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
    metrics: RwLock<SchedulerMetrics>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn task_submitted(&self, count: usize) {
        self.outstanding.fetch_add(count, Ordering::AcqRel);
        self.metrics.write().submitted += count as u64;
    }

    pub fn task_dispatched(&self) {
        self.metrics.write().dispatched += 1;
    }

    pub fn dispatch_pass(&self, dispatched: usize, remaining: usize) {
        self.metrics.write().dispatch_passes += 1;
        debug!(dispatched, remaining, "dispatch pass");
    }

    pub fn task_finished(&self, report: JobReport) {
        {
            let mut metrics = self.metrics.write();
            metrics.record_execution(report.elapsed, report.status == JobStatus::Succeeded);
            if report.status == JobStatus::Panicked {
                metrics.panicked += 1;
            }
        }
        self.settle();
    }

    pub fn task_abandoned(&self, key: &str) {
        debug!(key = %key, "task abandoned before dispatch");
        self.metrics.write().abandoned += 1;
        self.settle();
    }

    fn settle(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.idle_lock.lock();
            self.idle.notify_all();
        }
    }

    /// Block until no submitted task is pending or running.
    pub fn wait_idle(&self) {
        let mut guard = self.idle_lock.lock();
        while self.outstanding() > 0 {
            self.idle.wait(&mut guard);
        }
    }

    pub fn snapshot(&self) -> SchedulerMetrics {
        self.metrics.read().clone()
    }
}
