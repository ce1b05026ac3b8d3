//! Admission-controlled scheduler
//!
//! Bounds how many submitted tasks run at once, queues the rest in submission
//! order, and publishes every change of the task sequence to subscribers.

mod actor;
mod config;
mod core;
mod error;
mod handle;
mod messages;
mod queue;

pub use config::SchedulerConfig;
pub use self::core::Scheduler;
pub use error::{ConfigError, GuardViolation, SchedulerError, TaskError};
pub use handle::TaskHandle;
pub use queue::{QueueState, SchedulerStats, StatusProfile, TaskList};
