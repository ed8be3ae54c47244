use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scheduler operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Tasks accepted by `submit`/`submit_batch`.
    pub submitted: u64,
    /// Tasks handed to the worker pool.
    pub dispatched: u64,
    /// Tasks whose work function returned `Ok`.
    pub succeeded: u64,
    /// Tasks whose work function returned an error or panicked.
    pub failed: u64,
    /// Subset of `failed` that panicked.
    pub panicked: u64,
    /// Tasks dropped unrun at teardown.
    pub abandoned: u64,
    /// Dispatch passes that found pending work.
    pub dispatch_passes: u64,
    /// Workers currently executing a task body.
    pub active_workers: usize,
    /// Highest number of simultaneously executing task bodies.
    pub peak_active_workers: usize,
    /// Running mean of task body duration.
    pub avg_task_duration: Duration,
    /// When the most recent task finished.
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Tasks that finished running, successfully or not.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Record one finished task body.
    pub fn record_execution(&mut self, duration: Duration, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.last_completed_at = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let count = self.completed();
        self.avg_task_duration = if count == 1 {
            duration
        } else {
            let prev_nanos = self.avg_task_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}
