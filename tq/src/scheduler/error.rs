//! Scheduler error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{SchedulerId, TaskId, TaskStatus};

/// Invalid scheduler configuration; fatal to construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_concurrency must be a positive number, got {0}")]
    InvalidConcurrency(usize),

    #[error("event_capacity must be a positive number, got {0}")]
    InvalidEventCapacity(usize),
}

/// Errors returned by scheduler operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Scheduler must be created inside a Tokio runtime")]
    NoRuntime,

    #[error("Scheduler is shut down")]
    Closed,
}

/// Why a settlement handle resolved without a value
#[derive(Debug, Error)]
pub enum TaskError {
    /// The work function returned an error, or panicked
    #[error("Task {name} ({id}) failed: {report:#}")]
    Execution {
        id: TaskId,
        name: String,
        report: eyre::Report,
    },

    /// The scheduler shut down before the task settled
    #[error("Task {name} ({id}) stopped before it settled")]
    Stopped { id: TaskId, name: String },
}

impl TaskError {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskError::Execution { id, .. } | TaskError::Stopped { id, .. } => *id,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TaskError::Stopped { .. })
    }

    /// The work function's error, if it failed
    pub fn report(&self) -> Option<&eyre::Report> {
        match self {
            TaskError::Execution { report, .. } => Some(report),
            TaskError::Stopped { .. } => None,
        }
    }
}

/// Guard check that refused to execute a task
///
/// Violations are logged and reported on the event bus; execution is skipped
/// and nothing surfaces to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GuardViolation {
    #[error("Attempt to perform stopped task {task}")]
    StoppedTaskAccess { task: TaskId },

    #[error("Attempt to process foreign task {task} owned by scheduler {owner}")]
    OwnershipViolation { task: TaskId, owner: SchedulerId },

    #[error("Attempt to perform task {task} in status {status}")]
    ReentrantAdmission { task: TaskId, status: TaskStatus },
}

impl GuardViolation {
    pub fn task_id(&self) -> TaskId {
        match self {
            GuardViolation::StoppedTaskAccess { task }
            | GuardViolation::OwnershipViolation { task, .. }
            | GuardViolation::ReentrantAdmission { task, .. } => *task,
        }
    }
}
