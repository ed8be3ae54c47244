use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keylane_core::TaskError;

use crate::handle::ResultHandle;
use crate::registry::Claim;
use crate::tracker::Tracker;

/// Identity of one submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Work function of a task. Receives the payload by reference.
pub type WorkFn<M, R> = Box<dyn FnOnce(&M) -> anyhow::Result<R> + Send>;

/// A keyed unit of work: a payload and the function that processes it.
///
/// Tasks sharing a key never run at the same time; tasks with distinct keys
/// run in parallel up to the worker pool size.
pub struct Task<M, R> {
    key: String,
    payload: M,
    work: WorkFn<M, R>,
}

impl<M, R> Task<M, R>
where
    M: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F, E>(key: impl Into<String>, payload: M, work: F) -> Self
    where
        F: FnOnce(&M) -> Result<R, E> + Send + 'static,
        E: Into<anyhow::Error>,
    {
        Self {
            key: key.into(),
            payload,
            work: Box::new(move |payload| work(payload).map_err(Into::into)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &M {
        &self.payload
    }

    /// Erase the payload/result types, pairing the job with the handle its
    /// outcome is delivered to.
    pub(crate) fn into_job(self, tracker: Arc<Tracker>) -> (Job, ResultHandle<R>) {
        let id = TaskId::new();
        let (completer, handle) = crate::handle::pair(id, self.key.clone());
        let Task { key, payload, work } = self;

        let body: JobBody = Box::new(move |claim: Claim| {
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(&payload)));
            let elapsed = started.elapsed();

            // The key is free before anyone can observe the outcome.
            let key = claim.key().to_string();
            claim.release();

            let (status, outcome) = match result {
                Ok(Ok(value)) => (JobStatus::Succeeded, Ok(value)),
                Ok(Err(source)) => {
                    tracing::warn!(key = %key, task_id = %id, error = %source, "task failed");
                    (JobStatus::Failed, Err(TaskError::Failed { key, source }))
                }
                Err(panic) => {
                    let message = panic_message(&*panic);
                    tracing::warn!(key = %key, task_id = %id, %message, "task panicked");
                    (JobStatus::Panicked, Err(TaskError::Panicked { key, message }))
                }
            };
            completer.complete(outcome);
            JobReport { status, elapsed }
        });

        let job = Job {
            id,
            key,
            body: Some(body),
            tracker,
        };
        (job, handle)
    }
}

impl<M: fmt::Debug, R> fmt::Debug for Task<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Type-erased job ──────────────────────────────────────────

type JobBody = Box<dyn FnOnce(Claim) -> JobReport + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobStatus {
    Succeeded,
    Failed,
    Panicked,
}

/// What a worker learned from running one job.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JobReport {
    pub status: JobStatus,
    pub elapsed: Duration,
}

/// A submitted task with its types erased, as held by the pending queue
/// and handed to the worker pool.
///
/// Dropping a job that never ran counts it as abandoned; its handle then
/// resolves with [`TaskError::Abandoned`].
pub(crate) struct Job {
    id: TaskId,
    key: String,
    body: Option<JobBody>,
    tracker: Arc<Tracker>,
}

impl Job {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run the work function under `claim`. The claim is released on every
    /// path before this returns.
    pub fn run(mut self, claim: Claim) -> Option<JobReport> {
        let body = self.body.take()?;
        Some(body(claim))
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if self.body.is_some() {
            self.tracker.task_abandoned(&self.key);
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KeyRegistry;

    fn claim_for(registry: &Arc<KeyRegistry>, job: &Job) -> Claim {
        assert!(registry.try_claim(job.key(), job.id()));
        Claim::new(job.key(), registry.clone())
    }

    #[test]
    fn run_resolves_handle_and_releases_key() {
        let tracker = Arc::new(Tracker::new());
        let registry = Arc::new(KeyRegistry::new());
        tracker.task_submitted(1);

        let (job, handle) = Task::new("111", 20, |n: &i32| Ok::<_, anyhow::Error>(n * 2))
            .into_job(tracker.clone());
        let claim = claim_for(&registry, &job);
        let report = job.run(claim).unwrap();

        assert_eq!(report.status, JobStatus::Succeeded);
        assert!(!registry.is_claimed("111"));
        assert_eq!(handle.wait().unwrap(), 40);
    }

    #[test]
    fn failure_is_captured() {
        let tracker = Arc::new(Tracker::new());
        let registry = Arc::new(KeyRegistry::new());

        let (job, handle) = Task::new("k", (), |_: &()| -> anyhow::Result<()> {
            anyhow::bail!("boom")
        })
        .into_job(tracker);
        let claim = claim_for(&registry, &job);
        let report = job.run(claim).unwrap();

        assert_eq!(report.status, JobStatus::Failed);
        assert!(!registry.is_claimed("k"));
        let err = handle.wait().unwrap_err();
        assert!(matches!(err, TaskError::Failed { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn panic_is_captured_and_key_released() {
        let tracker = Arc::new(Tracker::new());
        let registry = Arc::new(KeyRegistry::new());

        let (job, handle) = Task::new("k", (), |_: &()| -> anyhow::Result<()> {
            panic!("worker blew up")
        })
        .into_job(tracker);
        let claim = claim_for(&registry, &job);
        let report = job.run(claim).unwrap();

        assert_eq!(report.status, JobStatus::Panicked);
        assert!(!registry.is_claimed("k"));
        match handle.wait() {
            Err(TaskError::Panicked { message, .. }) => assert_eq!(message, "worker blew up"),
            other => panic!("expected panic outcome, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn dropped_job_is_abandoned() {
        let tracker = Arc::new(Tracker::new());
        tracker.task_submitted(1);
        let (job, handle) =
            Task::new("k", (), |_: &()| Ok::<_, anyhow::Error>(())).into_job(tracker.clone());
        drop(job);

        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(tracker.snapshot().abandoned, 1);
        assert!(matches!(handle.wait(), Err(TaskError::Abandoned { .. })));
    }
}
