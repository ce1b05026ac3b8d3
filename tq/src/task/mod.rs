//! Task - one submitted unit of work and its observable lifecycle
//!
//! A `Task` is a cheap, cloneable handle onto a [`Subject`] holding the
//! task's current [`TaskState`]. Only the scheduler that created a task may
//! advance it; callers and work functions can observe it but never mutate it.

mod id;
mod state;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::subject::{StreamState, Subject, Subscription};

pub use id::{IdGenerator, SchedulerId, TaskId};
pub use state::{TaskState, TaskStatus};

/// Marker returned by [`Task::serialize`] for a force-closed task
pub const STOPPED_MARKER: &str = "stopped";

struct TaskInner {
    id: TaskId,
    name: String,
    owner: SchedulerId,
    state: Subject<TaskState>,
}

/// Handle onto a submitted task
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    pub(crate) fn new(owner: SchedulerId, id: TaskId, name: String, args: Vec<Value>) -> Self {
        debug!(%id, %name, "Task::new: called");
        let state = TaskState::new(id, name.clone(), args);
        Self {
            inner: Arc::new(TaskInner {
                id,
                name,
                owner,
                state: Subject::new(state),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn owner(&self) -> SchedulerId {
        self.inner.owner
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.state.value().status
    }

    /// Current snapshot
    pub fn state(&self) -> TaskState {
        self.inner.state.value()
    }

    /// Arguments captured at submission
    pub fn args(&self) -> Vec<Value> {
        self.inner.state.value().args
    }

    /// Watch status transitions, starting with the current snapshot
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TaskState) + Send + Sync + 'static,
    {
        self.inner.state.subscribe(listener)
    }

    /// True once the task is `done`, `error`, or force-closed
    pub fn is_terminal(&self) -> bool {
        self.inner.state.is_closed() || self.status().is_terminal()
    }

    /// True if the task was force-closed by a scheduler shutdown
    pub fn is_stopped(&self) -> bool {
        self.inner.state.state() == StreamState::Aborted
    }

    /// Externally visible state as JSON, or `"stopped"` after a forced close
    pub fn serialize(&self) -> Value {
        if self.is_stopped() {
            return Value::String(STOPPED_MARKER.to_string());
        }
        serde_json::to_value(self.state()).unwrap_or_else(|e| {
            warn!(id = %self.inner.id, error = %e, "Task::serialize: failed to render state");
            Value::Null
        })
    }

    /// Publish the next state if it is a legal successor of the current one
    pub(crate) fn advance(&self, next: TaskState) -> bool {
        let current = self.status();
        if !current.can_advance_to(next.status) {
            warn!(id = %self.inner.id, from = %current, to = %next.status, "Task::advance: illegal transition");
            return false;
        }
        debug!(id = %self.inner.id, from = %current, to = %next.status, "Task::advance");
        self.inner.state.publish(next)
    }

    /// Close the stream after a terminal transition
    pub(crate) fn complete(&self) -> bool {
        self.inner.state.complete()
    }

    /// Force-close the stream without a result or error
    pub(crate) fn abort(&self) -> bool {
        debug!(id = %self.inner.id, "Task::abort: called");
        self.inner.state.abort()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .field("stream", &self.inner.state.state())
            .finish()
    }
}
