//! Result handles: one per submitted task, resolved exactly once.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use keylane_core::{Outcome, TaskError};

use crate::task::TaskId;

/// Caller-side view of a submitted task's eventual outcome.
///
/// Resolve it with [`ResultHandle::wait`] from a plain thread, or `.await`
/// it from async code. If the scheduler is torn down before the task runs,
/// the handle resolves with [`TaskError::Abandoned`].
pub struct ResultHandle<R> {
    id: TaskId,
    key: String,
    rx: oneshot::Receiver<Outcome<R>>,
}

/// Producer side of a [`ResultHandle`], owned by the running job.
pub(crate) struct Completer<R> {
    tx: oneshot::Sender<Outcome<R>>,
}

pub(crate) fn pair<R>(id: TaskId, key: String) -> (Completer<R>, ResultHandle<R>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, ResultHandle { id, key, rx })
}

impl<R> Completer<R> {
    pub fn complete(self, outcome: Outcome<R>) {
        // A dropped handle just means nobody is interested in the outcome.
        let _ = self.tx.send(outcome);
    }
}

impl<R> ResultHandle<R> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Block the current thread until the task resolves.
    ///
    /// Panics if called from within an async runtime; `.await` the handle
    /// there instead.
    pub fn wait(self) -> Outcome<R> {
        let Self { key, rx, .. } = self;
        rx.blocking_recv()
            .unwrap_or_else(|_| Err(TaskError::Abandoned { key }))
    }

    /// Take the outcome if the task has already resolved, otherwise hand the
    /// handle back.
    pub fn try_take(mut self) -> Result<Outcome<R>, Self> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(outcome),
            Err(oneshot::error::TryRecvError::Empty) => Err(self),
            Err(oneshot::error::TryRecvError::Closed) => {
                Ok(Err(TaskError::Abandoned { key: self.key }))
            }
        }
    }
}

impl<R> Future for ResultHandle<R> {
    type Output = Outcome<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Abandoned {
                key: self.key.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> fmt::Debug for ResultHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
