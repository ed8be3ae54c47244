//! Dispatch strategies: how pending tasks are matched against free keys and
//! handed to the worker pool.
//!
//! - [`ScanDispatcher`]: a dispatcher thread scans the pending queue and
//!   claims keys in the [`KeyRegistry`](crate::registry::KeyRegistry).
//!   Between unproductive passes it either parks until a task is enqueued or
//!   a key released ([`DispatchStrategy::Notify`]) or sleeps a fixed
//!   interval ([`DispatchStrategy::Poll`]).
//! - [`LaneDispatcher`]: no dispatcher thread. Each busy key owns a FIFO
//!   lane, and a finishing task passes its key straight to the next task in
//!   its lane ([`DispatchStrategy::Lanes`]).

mod lanes;
mod scan;

use std::sync::Arc;

use keylane_core::{DispatchStrategy, SchedulerConfig, SchedulerError};

use crate::pool::WorkerPool;
use crate::task::Job;

pub(crate) use lanes::LaneDispatcher;
pub(crate) use scan::ScanDispatcher;

/// The scheduling strategy seam.
pub(crate) trait Dispatch: Send + Sync {
    /// Accept newly submitted jobs, in submission order.
    fn enqueue(&self, jobs: Vec<Job>);

    /// Make sure every pending job is looked at again soon.
    fn kick(&self);

    /// Jobs submitted but not yet handed to the pool.
    fn pending(&self) -> usize;

    /// Keys currently held by an executing task.
    fn claimed_keys(&self) -> usize;

    /// Stop dispatching and drop every job that was never dispatched.
    fn stop(&self);
}

pub(crate) fn start(
    config: &SchedulerConfig,
    pool: Arc<WorkerPool>,
) -> Result<Box<dyn Dispatch>, SchedulerError> {
    let dispatcher: Box<dyn Dispatch> = match config.strategy {
        DispatchStrategy::Notify | DispatchStrategy::Poll => {
            Box::new(ScanDispatcher::start(config, pool)?)
        }
        DispatchStrategy::Lanes => Box::new(LaneDispatcher::new(pool)),
    };
    Ok(dispatcher)
}
