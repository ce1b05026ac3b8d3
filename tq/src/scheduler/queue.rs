//! Queue snapshot types for the scheduler

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::task::{TaskState, TaskStatus};

/// Immutable snapshot of the task sequence, in submission order
pub type TaskList = Arc<[TaskState]>;

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    pub total_started: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_stopped: u64,
    pub guard_violations: u64,
    pub peak_concurrent: usize,
    pub peak_queue_depth: usize,
}

/// Status counts over one snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueState {
    pub queued: usize,
    pub active: usize,
    pub done: usize,
    pub failed: usize,
    pub closed: bool,
}

impl QueueState {
    pub fn from_tasks(tasks: &[TaskState], closed: bool) -> Self {
        let mut state = Self {
            closed,
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::New => state.queued += 1,
                TaskStatus::Active => state.active += 1,
                TaskStatus::Done => state.done += 1,
                TaskStatus::Error => state.failed += 1,
            }
        }
        state
    }

    /// True when nothing is waiting or running
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && self.active == 0
    }
}

/// Task names grouped by status, in submission order within each group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusProfile(BTreeMap<TaskStatus, Vec<String>>);

impl StatusProfile {
    pub fn of(tasks: &[TaskState]) -> Self {
        let mut groups: BTreeMap<TaskStatus, Vec<String>> = BTreeMap::new();
        for task in tasks {
            groups.entry(task.status).or_default().push(task.name.clone());
        }
        Self(groups)
    }

    pub fn names(&self, status: TaskStatus) -> &[String] {
        self.0.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.names(status).len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, &[String])> {
        self.0.iter().map(|(status, names)| (*status, names.as_slice()))
    }
}

impl<S: Into<String>> FromIterator<(TaskStatus, Vec<S>)> for StatusProfile {
    fn from_iter<I: IntoIterator<Item = (TaskStatus, Vec<S>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .filter(|(_, names)| !names.is_empty())
                .map(|(status, names)| (status, names.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

impl std::fmt::Display for StatusProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(empty)");
        }
        let groups: Vec<String> = self
            .0
            .iter()
            .map(|(status, names)| format!("{}: [{}]", status, names.join(", ")))
            .collect();
        write!(f, "{}", groups.join(" "))
    }
}
