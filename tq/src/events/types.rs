//! Event types for scheduler activity streaming
//!
//! These events describe every lifecycle step the scheduler takes:
//! - Task lifecycle (queued, started, completed, failed, evicted, stopped)
//! - Guard violations detected during admission or settlement
//! - Scheduler shutdown

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::GuardViolation;
use crate::task::TaskId;

/// Core event enum - the vocabulary of scheduler activity
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    // === Task Lifecycle ===
    /// A task was appended to the queue
    TaskQueued { task_id: TaskId, name: String, position: usize },
    /// A task was admitted and its work function launched
    TaskStarted { task_id: TaskId, name: String, active: usize },
    /// A task's work function returned a value
    TaskCompleted {
        task_id: TaskId,
        name: String,
        duration_ms: u64,
    },
    /// A task's work function failed
    TaskFailed { task_id: TaskId, name: String, error: String },
    /// A failed task was removed from the queue
    TaskEvicted { task_id: TaskId, name: String },
    /// A task was force-closed by shutdown
    TaskStopped { task_id: TaskId, name: String },

    // === Scheduler ===
    /// A guard check refused to execute a task
    GuardViolation { violation: GuardViolation },
    /// The scheduler was shut down
    SchedulerClosed { stopped: usize },
}

impl QueueEvent {
    /// Get the task ID for this event, if it concerns a single task
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            QueueEvent::TaskQueued { task_id, .. }
            | QueueEvent::TaskStarted { task_id, .. }
            | QueueEvent::TaskCompleted { task_id, .. }
            | QueueEvent::TaskFailed { task_id, .. }
            | QueueEvent::TaskEvicted { task_id, .. }
            | QueueEvent::TaskStopped { task_id, .. } => Some(*task_id),
            QueueEvent::GuardViolation { violation } => Some(violation.task_id()),
            QueueEvent::SchedulerClosed { .. } => None,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::TaskQueued { .. } => "TaskQueued",
            QueueEvent::TaskStarted { .. } => "TaskStarted",
            QueueEvent::TaskCompleted { .. } => "TaskCompleted",
            QueueEvent::TaskFailed { .. } => "TaskFailed",
            QueueEvent::TaskEvicted { .. } => "TaskEvicted",
            QueueEvent::TaskStopped { .. } => "TaskStopped",
            QueueEvent::GuardViolation { .. } => "GuardViolation",
            QueueEvent::SchedulerClosed { .. } => "SchedulerClosed",
        }
    }
}

/// A timestamped event log entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: QueueEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: QueueEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_task_id() {
        let event = QueueEvent::TaskStarted {
            task_id: TaskId::new(3),
            name: "fetch".to_string(),
            active: 1,
        };
        assert_eq!(event.task_id(), Some(TaskId::new(3)));
        assert_eq!(QueueEvent::SchedulerClosed { stopped: 0 }.task_id(), None);
    }

    #[test]
    fn test_guard_violation_event_carries_task() {
        let event = QueueEvent::GuardViolation {
            violation: GuardViolation::StoppedTaskAccess { task: TaskId::new(9) },
        };
        assert_eq!(event.task_id(), Some(TaskId::new(9)));
        assert_eq!(event.event_type(), "GuardViolation");
    }

    #[test]
    fn test_event_serialization() {
        let event = QueueEvent::TaskFailed {
            task_id: TaskId::new(2),
            name: "second".to_string(),
            error: "boom".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"TaskFailed\""));
        assert!(json.contains("boom"));

        let parsed: QueueEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.task_id(), Some(TaskId::new(2)));
        assert_eq!(parsed.event_type(), "TaskFailed");
    }

    #[test]
    fn test_event_log_entry() {
        let entry = EventLogEntry::new(QueueEvent::TaskQueued {
            task_id: TaskId::new(1),
            name: "first".to_string(),
            position: 0,
        });

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"ts\""));
        assert!(json.contains("TaskQueued"));
    }
}
