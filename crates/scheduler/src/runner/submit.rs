use std::sync::Arc;

use keylane_core::SchedulerError;
use rayon::prelude::*;
use tracing::debug;

use crate::handle::ResultHandle;
use crate::task::{Job, Task};

use super::Scheduler;

impl Scheduler {
    /// Submit one task. Never blocks on task execution; the returned handle
    /// resolves once `work(&payload)` has run.
    ///
    /// Fails with [`SchedulerError::InvalidKey`] for an empty key and
    /// [`SchedulerError::Closed`] after shutdown; in both cases nothing is
    /// enqueued.
    pub fn submit<M, R, F, E>(
        &self,
        key: impl Into<String>,
        payload: M,
        work: F,
    ) -> Result<ResultHandle<R>, SchedulerError>
    where
        M: Send + 'static,
        R: Send + 'static,
        F: FnOnce(&M) -> Result<R, E> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        self.submit_task(Task::new(key, payload, work))
    }

    /// Submit a pre-built [`Task`].
    pub fn submit_task<M, R>(&self, task: Task<M, R>) -> Result<ResultHandle<R>, SchedulerError>
    where
        M: Send + 'static,
        R: Send + 'static,
    {
        if task.key().is_empty() {
            return Err(SchedulerError::InvalidKey);
        }

        let closed = self.closed.read();
        if *closed {
            return Err(SchedulerError::Closed);
        }
        let (job, handle) = task.into_job(Arc::clone(&self.tracker));
        debug!(key = %job.key(), task_id = %job.id(), "task submitted");
        self.tracker.task_submitted(1);
        self.dispatcher.enqueue(vec![job]);
        Ok(handle)
    }

    /// Submit one task per item, deriving each key with `key_fn`.
    ///
    /// Keys are derived in parallel. The batch is all-or-nothing: if any key
    /// is empty, no item is enqueued. Handles are returned in item order.
    pub fn submit_batch<M, R, K, F, E>(
        &self,
        items: Vec<M>,
        key_fn: K,
        work: F,
    ) -> Result<Vec<ResultHandle<R>>, SchedulerError>
    where
        M: Send + Sync + 'static,
        R: Send + 'static,
        K: Fn(&M) -> String + Send + Sync,
        F: Fn(&M) -> Result<R, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        let keys: Vec<String> = items.par_iter().map(|item| key_fn(item)).collect();
        if keys.iter().any(String::is_empty) {
            return Err(SchedulerError::InvalidKey);
        }

        let closed = self.closed.read();
        if *closed {
            return Err(SchedulerError::Closed);
        }

        let work = Arc::new(work);
        let (jobs, handles): (Vec<Job>, Vec<ResultHandle<R>>) = items
            .into_iter()
            .zip(keys)
            .map(|(item, key)| {
                let work = Arc::clone(&work);
                Task::new(key, item, move |item: &M| work(item))
                    .into_job(Arc::clone(&self.tracker))
            })
            .unzip();

        debug!(count = jobs.len(), "batch submitted");
        self.tracker.task_submitted(jobs.len());
        self.dispatcher.enqueue(jobs);
        Ok(handles)
    }
}
