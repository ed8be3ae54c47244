use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::pool::WorkerPool;
use crate::registry::{Claim, KeyRelease};
use crate::task::Job;

use super::Dispatch;

/// Tasks waiting behind the running task for one key, oldest first.
type Lane = Mutex<VecDeque<Job>>;

/// Per-key lanes. A key present in the table is held by a running task.
struct LaneTable {
    lanes: DashMap<String, Lane>,
    pool: Arc<WorkerPool>,
    stopped: AtomicBool,
}

impl LaneTable {
    fn admit(self: &Arc<Self>, job: Job) {
        let runnable = match self.lanes.entry(job.key().to_string()) {
            Entry::Occupied(mut lane) => {
                lane.get_mut().get_mut().push_back(job);
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(Mutex::new(VecDeque::new()));
                Some(job)
            }
        };
        if let Some(job) = runnable {
            self.start(job);
        }
    }

    fn start(self: &Arc<Self>, job: Job) {
        debug!(key = %job.key(), task_id = %job.id(), "claimed key");
        let claim = Claim::new(job.key(), Arc::clone(self) as Arc<dyn KeyRelease>);
        self.pool.tracker().task_dispatched();
        self.pool.execute(job, claim);
    }
}

impl KeyRelease for LaneTable {
    /// Hand the key to the next task in its lane, or free it when the lane
    /// is empty. Both happen under the same entry lock as [`LaneTable::admit`],
    /// so a task arriving concurrently is either queued before the lane is
    /// checked or finds the key free.
    fn release_key(self: Arc<Self>, key: &str) {
        let stopped = self.stopped.load(Ordering::Acquire);
        let next = match self.lanes.entry(key.to_string()) {
            Entry::Occupied(mut lane) => match lane.get_mut().get_mut().pop_front() {
                Some(job) if !stopped => Some(job),
                _ => {
                    lane.remove();
                    None
                }
            },
            Entry::Vacant(_) => None,
        };
        if let Some(job) = next {
            self.start(job);
        }
    }
}

/// Reactive dispatch: release of a key triggers the next task for that key.
pub(crate) struct LaneDispatcher {
    table: Arc<LaneTable>,
}

impl LaneDispatcher {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        info!("Lane dispatcher ready");
        Self {
            table: Arc::new(LaneTable {
                lanes: DashMap::new(),
                pool,
                stopped: AtomicBool::new(false),
            }),
        }
    }
}

impl Dispatch for LaneDispatcher {
    fn enqueue(&self, jobs: Vec<Job>) {
        for job in jobs {
            self.table.admit(job);
        }
    }

    /// Lanes never hold a task whose key is free, so there is nothing to
    /// rescan.
    fn kick(&self) {}

    fn pending(&self) -> usize {
        self.table.lanes.iter().map(|lane| lane.value().lock().len()).sum()
    }

    fn claimed_keys(&self) -> usize {
        self.table.lanes.len()
    }

    fn stop(&self) {
        self.table.stopped.store(true, Ordering::Release);
        let mut dropped = 0;
        for mut lane in self.table.lanes.iter_mut() {
            dropped += lane.value_mut().get_mut().drain(..).count();
        }
        if dropped > 0 {
            info!("Dropped {} undispatched tasks", dropped);
        }
    }
}

impl Drop for LaneDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
