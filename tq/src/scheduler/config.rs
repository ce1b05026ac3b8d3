//! Scheduler configuration

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::events::DEFAULT_CHANNEL_CAPACITY;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max tasks in `active` status at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Buffer size of the lifecycle event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_concurrency() -> usize {
    10
}

fn default_event_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Default configuration with the given concurrency cap
    pub fn with_max_concurrency(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.max_concurrency));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidEventCapacity(self.event_capacity));
        }
        Ok(())
    }
}
