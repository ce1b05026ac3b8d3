//! Messages processed by the scheduler actor

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

use super::queue::SchedulerStats;
use crate::task::{Task, TaskId};

/// Type-erased work item; launched once, when the task is admitted
pub(crate) type Job = Box<dyn FnOnce(Task) -> BoxFuture<'static, ()> + Send>;

/// How a work function settled
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Completed(Value),
    Failed(String),
}

/// Requests sent to the scheduler actor
pub(crate) enum Command {
    /// Append a new task to the sequence
    Submit { task: Task, job: Job },

    /// A running task's work function settled
    ///
    /// `ack` is answered once the settlement is recorded; dropping it means
    /// the outcome was discarded.
    Settled {
        id: TaskId,
        outcome: Outcome,
        ack: oneshot::Sender<()>,
    },

    /// Read the scheduler statistics
    Stats { reply: oneshot::Sender<SchedulerStats> },

    /// Stop admitting and force-close outstanding tasks
    ///
    /// `ack` is answered once every outstanding task is closed.
    Shutdown { ack: oneshot::Sender<()> },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Submit { task, .. } => f.debug_struct("Submit").field("task", &task.id()).finish(),
            Command::Settled { id, outcome, .. } => f
                .debug_struct("Settled")
                .field("id", id)
                .field("outcome", outcome)
                .finish(),
            Command::Stats { .. } => write!(f, "Stats"),
            Command::Shutdown { .. } => write!(f, "Shutdown"),
        }
    }
}
