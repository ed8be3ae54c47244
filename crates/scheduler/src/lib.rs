//! Keyed task scheduler: parallel across keys, one-at-a-time per key.
//!
//! Tasks are submitted with a string key. Tasks with distinct keys run in
//! parallel on a bounded worker pool; tasks sharing a key run strictly one
//! after another, in submission order. Each submission returns a
//! [`ResultHandle`] that resolves with the task's value or its
//! [`TaskError`].
//!
//! ```no_run
//! use keylane_scheduler::Scheduler;
//!
//! let scheduler = Scheduler::new(4)?;
//! let handles = scheduler.submit_batch(
//!     vec![("111", 1), ("222", 2), ("111", 3)],
//!     |(mobile, _)| mobile.to_string(),
//!     |(_, id)| Ok::<_, anyhow::Error>(id * 10),
//! )?;
//! for outcome in scheduler.await_all(handles) {
//!     println!("{:?}", outcome);
//! }
//! # Ok::<(), keylane_scheduler::SchedulerError>(())
//! ```

mod dispatch;
pub mod global;
pub mod handle;
pub mod metrics;
mod pool;
mod queue;
pub mod registry;
pub mod runner;
pub mod task;
mod tracker;

pub use global::global;
pub use handle::ResultHandle;
pub use keylane_core::{DispatchStrategy, Outcome, SchedulerConfig, SchedulerError, TaskError};
pub use metrics::SchedulerMetrics;
pub use registry::KeyRegistry;
pub use runner::Scheduler;
pub use task::{Task, TaskId, WorkFn};
