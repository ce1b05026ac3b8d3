//! Task status and immutable state snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::TaskId;

/// Lifecycle status of a task
///
/// Transitions are monotonic: `new -> active -> {done | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    New,
    Active,
    Done,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Active) | (Self::Active, Self::Done) | (Self::Active, Self::Error)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Active => write!(f, "active"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Point-in-time view of one task
///
/// `result` is only set in `done`, `error` only in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub id: TaskId,
    pub name: String,
    pub args: Vec<Value>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskState {
    pub(crate) fn new(id: TaskId, name: String, args: Vec<Value>) -> Self {
        Self {
            id,
            name,
            args,
            status: TaskStatus::New,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub(crate) fn activated(&self) -> Self {
        Self {
            status: TaskStatus::Active,
            started_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    pub(crate) fn completed(&self, result: Value) -> Self {
        Self {
            status: TaskStatus::Done,
            result: Some(result),
            error: None,
            finished_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    pub(crate) fn failed(&self, error: String) -> Self {
        Self {
            status: TaskStatus::Error,
            result: None,
            error: Some(error),
            finished_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Time spent running, once the task has settled
    pub fn run_time(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> TaskState {
        TaskState::new(TaskId::new(1), "fetch".to_string(), vec![json!("https://example.com")])
    }

    #[test]
    fn test_status_transitions() {
        assert!(TaskStatus::New.can_advance_to(TaskStatus::Active));
        assert!(TaskStatus::Active.can_advance_to(TaskStatus::Done));
        assert!(TaskStatus::Active.can_advance_to(TaskStatus::Error));

        assert!(!TaskStatus::New.can_advance_to(TaskStatus::Done));
        assert!(!TaskStatus::Active.can_advance_to(TaskStatus::New));
        assert!(!TaskStatus::Done.can_advance_to(TaskStatus::Error));
        assert!(!TaskStatus::Error.can_advance_to(TaskStatus::Active));
        assert!(!TaskStatus::Active.can_advance_to(TaskStatus::Active));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::New.is_terminal());
        assert!(!TaskStatus::Active.is_terminal());
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(serde_json::to_string(&TaskStatus::Active).unwrap(), "\"active\"");
        let status: TaskStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(status, TaskStatus::Error);
    }

    #[test]
    fn test_result_and_error_are_exclusive() {
        let done = state().activated().completed(json!(3));
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(done.result, Some(json!(3)));
        assert!(done.error.is_none());
        assert!(done.run_time().is_some());

        let failed = state().activated().failed("boom".to_string());
        assert_eq!(failed.status, TaskStatus::Error);
        assert!(failed.result.is_none());
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_new_state_omits_empty_fields() {
        let value = serde_json::to_value(state()).unwrap();
        assert_eq!(value["status"], "new");
        assert_eq!(value["name"], "fetch");
        assert!(value.get("result").is_none());
        assert!(value.get("started_at").is_none());
    }
}
