//! TaskHandle - settlement future returned by `Scheduler::submit`

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::error::TaskError;
use crate::subject::Subscription;
use crate::task::{Task, TaskId, TaskState};

/// Resolves with the work function's value once the task is `done`, or with
/// a [`TaskError`] once it is `error` or force-closed
///
/// Dropping the handle does not cancel the task.
#[must_use = "a TaskHandle does nothing unless awaited"]
pub struct TaskHandle<R> {
    task: Task,
    rx: oneshot::Receiver<Result<R, TaskError>>,
}

impl<R> TaskHandle<R> {
    pub(crate) fn new(task: Task, rx: oneshot::Receiver<Result<R, TaskError>>) -> Self {
        Self { task, rx }
    }

    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// The task this handle settles
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Watch the task's own transitions
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TaskState) + Send + Sync + 'static,
    {
        self.task.subscribe(listener)
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(settled)) => Poll::Ready(settled),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Stopped {
                id: this.task.id(),
                name: this.task.name().to_string(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> std::fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").field("task", &self.task).finish()
    }
}
