use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use keylane_core::{DispatchStrategy, SchedulerConfig, SchedulerError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::pool::WorkerPool;
use crate::queue::PendingQueue;
use crate::registry::{Claim, KeyRegistry, KeyRelease};
use crate::task::Job;
use crate::tracker::Tracker;

use super::Dispatch;

/// How the dispatcher thread idles after a pass that dispatched nothing.
#[derive(Debug, Clone, Copy)]
enum Idle {
    /// Park until signalled by an enqueue, a release or a kick.
    Park,
    /// Sleep a fixed interval regardless of events.
    Sleep(Duration),
}

/// Edge-triggered wake-up flag. A signal raised while the dispatcher is busy
/// is remembered, so the next wait returns immediately.
#[derive(Debug, Default)]
struct Wake {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl Wake {
    fn signal(&self) {
        *self.raised.lock() = true;
        self.cond.notify_one();
    }

    fn wait(&self) {
        let mut raised = self.raised.lock();
        if !*raised {
            self.cond.wait(&mut raised);
        }
        *raised = false;
    }
}

struct ScanState {
    registry: KeyRegistry,
    queue: PendingQueue,
    pool: Arc<WorkerPool>,
    idle: Idle,
    wake: Wake,
    stopped: AtomicBool,
}

impl ScanState {
    fn tracker(&self) -> &Tracker {
        self.pool.tracker()
    }

    /// One scan over the pending queue. Returns how many jobs were handed to
    /// the pool.
    fn pass(self: &Arc<Self>) -> usize {
        let snapshot = self.queue.take_snapshot();
        if snapshot.is_empty() {
            return 0;
        }

        let mut remaining = VecDeque::new();
        let mut dispatched = 0;
        for job in snapshot {
            if self.registry.try_claim(job.key(), job.id()) {
                debug!(key = %job.key(), task_id = %job.id(), "claimed key");
                let claim = Claim::new(job.key(), Arc::clone(self) as Arc<dyn KeyRelease>);
                self.tracker().task_dispatched();
                self.pool.execute(job, claim);
                dispatched += 1;
            } else {
                remaining.push_back(job);
            }
        }

        self.tracker().dispatch_pass(dispatched, remaining.len());
        self.queue.restore(remaining);
        dispatched
    }

    fn run(self: Arc<Self>) {
        info!("Dispatcher started ({:?})", self.idle);
        while !self.stopped.load(Ordering::Acquire) {
            if self.pass() > 0 {
                continue;
            }
            match self.idle {
                Idle::Park => self.wake.wait(),
                Idle::Sleep(interval) => thread::sleep(interval),
            }
        }
        info!("Dispatcher stopped");
    }
}

impl KeyRelease for ScanState {
    fn release_key(self: Arc<Self>, key: &str) {
        self.registry.release(key);
        if let Idle::Park = self.idle {
            self.wake.signal();
        }
    }
}

/// Dispatcher thread over a shared pending queue and key registry.
pub(crate) struct ScanDispatcher {
    state: Arc<ScanState>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ScanDispatcher {
    pub fn start(config: &SchedulerConfig, pool: Arc<WorkerPool>) -> Result<Self, SchedulerError> {
        let idle = match config.strategy {
            DispatchStrategy::Poll => Idle::Sleep(config.poll_interval()),
            _ => Idle::Park,
        };
        let state = Arc::new(ScanState {
            registry: KeyRegistry::new(),
            queue: PendingQueue::new(),
            pool,
            idle,
            wake: Wake::default(),
            stopped: AtomicBool::new(false),
        });

        let runner = Arc::clone(&state);
        let thread = thread::Builder::new()
            .name(format!("{}-dispatch", config.thread_name))
            .spawn(move || runner.run())
            .map_err(|e| SchedulerError::Startup(format!("dispatcher thread: {}", e)))?;

        Ok(Self {
            state,
            thread: Mutex::new(Some(thread)),
        })
    }
}

impl Dispatch for ScanDispatcher {
    fn enqueue(&self, jobs: Vec<Job>) {
        self.state.queue.extend(jobs);
        self.state.wake.signal();
    }

    fn kick(&self) {
        self.state.wake.signal();
    }

    fn pending(&self) -> usize {
        self.state.queue.len()
    }

    fn claimed_keys(&self) -> usize {
        self.state.registry.len()
    }

    fn stop(&self) {
        self.state.stopped.store(true, Ordering::Release);
        self.state.wake.signal();
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                tracing::error!("Dispatcher thread panicked");
            }
        }
        let dropped = self.state.queue.clear();
        if dropped > 0 {
            info!("Dropped {} undispatched tasks", dropped);
        }
    }
}

impl Drop for ScanDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
