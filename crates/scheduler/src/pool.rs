//! Bounded worker pool: a fixed set of named threads pulling claimed jobs
//! from a shared inbox.
//!
//! Task bodies never run on a work-stealing pool, so a body that uses rayon
//! internally cannot pick up other tasks while it waits on its own parallel
//! work. At most `size` bodies run at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use keylane_core::SchedulerError;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::registry::Claim;
use crate::task::Job;
use crate::tracker::Tracker;

#[derive(Default)]
struct Inbox {
    jobs: VecDeque<(Job, Claim)>,
    closed: bool,
}

struct Shared {
    inbox: Mutex<Inbox>,
    available: Condvar,
    active: AtomicUsize,
    peak: AtomicUsize,
    tracker: Arc<Tracker>,
}

impl Shared {
    /// Next job to run, or `None` once the pool is closed and the inbox is
    /// empty.
    fn next(&self) -> Option<(Job, Claim)> {
        let mut inbox = self.inbox.lock();
        loop {
            if let Some(next) = inbox.jobs.pop_front() {
                return Some(next);
            }
            if inbox.closed {
                return None;
            }
            self.available.wait(&mut inbox);
        }
    }

    fn close(&self) -> bool {
        let mut inbox = self.inbox.lock();
        let was_open = !inbox.closed;
        inbox.closed = true;
        self.available.notify_all();
        was_open
    }
}

fn worker_loop(shared: Arc<Shared>) {
    while let Some((job, claim)) = shared.next() {
        let running = shared.active.fetch_add(1, Ordering::AcqRel) + 1;
        shared.peak.fetch_max(running, Ordering::AcqRel);

        let report = job.run(claim);

        shared.active.fetch_sub(1, Ordering::AcqRel);
        if let Some(report) = report {
            shared.tracker.task_finished(report);
        }
    }
    debug!("worker exiting");
}

/// Fixed-size set of execution slots. A claimed job occupies one slot from
/// the moment its body starts until its key has been released.
pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize, thread_name: &str, tracker: Arc<Tracker>) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared {
            inbox: Mutex::new(Inbox::default()),
            available: Condvar::new(),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            tracker,
        });

        for i in 0..size {
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", thread_name, i))
                .spawn(move || worker_loop(worker));
            if let Err(e) = spawned {
                shared.close();
                return Err(SchedulerError::Startup(format!("worker thread {}: {}", i, e)));
            }
        }
        info!("Worker pool started with {} threads", size);

        Ok(Self { shared, size })
    }

    pub fn tracker(&self) -> &Tracker {
        &self.shared.tracker
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.shared.peak.load(Ordering::Acquire)
    }

    /// Queue a claimed job for the next free worker. If the pool has been
    /// shut down the job is dropped (its handle resolves as abandoned) and
    /// the claim released.
    pub fn execute(&self, job: Job, claim: Claim) {
        let rejected = {
            let mut inbox = self.shared.inbox.lock();
            if inbox.closed {
                Some((job, claim))
            } else {
                inbox.jobs.push_back((job, claim));
                self.shared.available.notify_one();
                None
            }
        };
        if let Some((job, claim)) = rejected {
            warn!(key = %job.key(), "worker pool is shut down, dropping task");
            drop(claim);
            drop(job);
        }
    }

    /// Stop accepting jobs. Workers finish what is already queued, then exit.
    pub fn shutdown(&self) {
        if self.shared.close() {
            info!("Worker pool shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
