//! Lifecycle events for live observability
//!
//! Task snapshots answer "what does the queue look like now"; events answer
//! "what just happened". The scheduler emits a [`QueueEvent`] on a tokio
//! broadcast channel for every lifecycle step, so consumers can log, count or
//! stream activity without polling snapshots.
//!
//! ```rust,ignore
//! let mut rx = scheduler.events();
//! while let Ok(event) = rx.recv().await {
//!     println!("{}", serde_json::to_string(&EventLogEntry::new(event))?);
//! }
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use types::{EventLogEntry, QueueEvent};
