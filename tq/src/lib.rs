//! TaskQueue - admission-controlled async task scheduler
//!
//! Callers submit units of asynchronous work (a function plus its arguments).
//! The scheduler runs at most N of them at once, queues the rest in
//! submission order, and reports each task's lifecycle
//! (`new -> active -> done | error`) to observers. It is meant for capping
//! concurrent I/O-bound operations without a worker pool or message broker.
//!
//! # Modules
//!
//! - [`scheduler`] - the scheduler, its configuration and settlement handles
//! - [`task`] - task identity, status and snapshots
//! - [`subject`] - replaying value cells used for every observable stream
//! - [`events`] - broadcast bus of lifecycle events
//! - [`config`] - file configuration for the `tq` binary
//! - [`cli`] - command-line interface
//!
//! # Example
//!
//! ```rust,ignore
//! use taskqueue::{Scheduler, Task};
//! use serde_json::{Value, json};
//!
//! async fn fetch(_task: Task, args: Vec<Value>) -> eyre::Result<usize> {
//!     let url = args[0].as_str().unwrap_or_default();
//!     Ok(reqwest::get(url).await?.bytes().await?.len())
//! }
//!
//! let scheduler = Scheduler::new(3)?;
//! scheduler.subscribe(|tasks| println!("{}", taskqueue::StatusProfile::of(tasks)));
//! let size = scheduler.submit(fetch, vec![json!("https://example.com")])?.await?;
//! ```

pub mod cli;
pub mod config;
pub mod events;
pub mod scheduler;
pub mod subject;
pub mod task;

// Re-export commonly used types
pub use config::Config;
pub use events::{EventBus, EventLogEntry, QueueEvent};
pub use scheduler::{
    ConfigError, GuardViolation, QueueState, Scheduler, SchedulerConfig, SchedulerError, SchedulerStats,
    StatusProfile, TaskError, TaskHandle, TaskList,
};
pub use subject::{StreamState, Subject, Subscription};
pub use task::{IdGenerator, STOPPED_MARKER, SchedulerId, Task, TaskId, TaskState, TaskStatus};
