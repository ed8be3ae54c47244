use std::sync::Arc;

use keylane_core::{DispatchStrategy, SchedulerConfig, SchedulerError};
use parking_lot::RwLock;
use tracing::info;

use crate::dispatch::{self, Dispatch};
use crate::metrics::SchedulerMetrics;
use crate::pool::WorkerPool;
use crate::tracker::Tracker;

/// Runs keyed tasks in parallel across keys and strictly one at a time per
/// key.
///
/// Each scheduler owns its own key registry: two schedulers given the same
/// key strings never block each other.
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    pub(super) pool: Arc<WorkerPool>,
    pub(super) tracker: Arc<Tracker>,
    pub(super) dispatcher: Box<dyn Dispatch>,
    /// `true` once the scheduler stops accepting submissions. Submitters
    /// hold the read side while enqueueing so closing cannot interleave with
    /// a half-finished submission.
    pub(super) closed: RwLock<bool>,
}

impl Scheduler {
    /// Create a scheduler with `pool_size` workers and default settings.
    pub fn new(pool_size: usize) -> Result<Self, SchedulerError> {
        Self::with_config(SchedulerConfig::with_workers(pool_size))
    }

    /// Create a scheduler from a full configuration.
    pub fn with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let workers = config.resolved_worker_threads();
        info!(
            "Scheduler starting with {} workers, {} dispatch",
            workers, config.strategy
        );

        let tracker = Arc::new(Tracker::new());
        let pool = Arc::new(WorkerPool::new(workers, &config.thread_name, Arc::clone(&tracker))?);
        let dispatcher = dispatch::start(&config, Arc::clone(&pool))?;

        Ok(Self {
            config,
            pool,
            tracker,
            dispatcher,
            closed: RwLock::new(false),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.config.strategy
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Whether new submissions are rejected.
    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// Tasks submitted but not yet handed to a worker.
    pub fn pending_len(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Tasks submitted and not yet resolved.
    pub fn in_flight(&self) -> usize {
        self.tracker.outstanding()
    }

    /// Keys currently held by an executing task.
    pub fn busy_keys(&self) -> usize {
        self.dispatcher.claimed_keys()
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        let mut metrics = self.tracker.snapshot();
        metrics.active_workers = self.pool.active();
        metrics.peak_active_workers = self.pool.peak();
        metrics
    }

    /// Stop accepting submissions. Returns `false` if already closed.
    pub(super) fn close(&self) -> bool {
        let mut closed = self.closed.write();
        if *closed {
            return false;
        }
        *closed = true;
        info!("Scheduler closed to new submissions");
        true
    }
}

impl Drop for Scheduler {
    /// Tasks already handed to the pool still run to completion; tasks that
    /// were never dispatched resolve as abandoned.
    fn drop(&mut self) {
        self.close();
        self.dispatcher.stop();
        self.pool.shutdown();
    }
}
