use keylane_core::Outcome;
use tracing::info;

use crate::handle::ResultHandle;

use super::Scheduler;

impl Scheduler {
    /// Block until every submitted task has resolved.
    ///
    /// With `shutdown_on_drain` (the default) the scheduler is closed first
    /// and the worker pool is shut down afterwards, so the scheduler accepts
    /// no further work. With it disabled the scheduler stays open and can be
    /// drained repeatedly.
    pub fn drain(&self) {
        let single_use = self.config.shutdown_on_drain;
        if single_use {
            self.close();
        }

        info!(
            "Draining scheduler: {} pending, {} in flight",
            self.pending_len(),
            self.in_flight()
        );
        self.dispatcher.kick();
        self.tracker.wait_idle();

        if single_use {
            self.dispatcher.stop();
            self.pool.shutdown();
        }
        info!("Scheduler drained");
    }

    /// Collect every handle's outcome in input order. One task's failure does
    /// not stop the others from being collected.
    ///
    /// With `shutdown_on_drain` this drains and shuts down the whole
    /// scheduler first. Otherwise it waits only on `handles`, so unrelated
    /// work on other keys does not hold it up.
    pub fn await_all<R>(&self, handles: Vec<ResultHandle<R>>) -> Vec<Outcome<R>> {
        if self.config.shutdown_on_drain {
            self.drain();
        } else {
            self.dispatcher.kick();
        }
        handles.into_iter().map(ResultHandle::wait).collect()
    }

    /// Close to new submissions, finish everything already submitted, then
    /// stop the dispatcher and worker pool.
    pub fn shutdown(&self) {
        self.close();
        self.dispatcher.kick();
        self.tracker.wait_idle();
        self.dispatcher.stop();
        self.pool.shutdown();
        info!("Scheduler stopped");
    }
}
