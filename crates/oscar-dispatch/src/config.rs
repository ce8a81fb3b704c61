//! Dispatcher configuration

use serde::{Deserialize, Serialize};

/// Default name of the deferred-bundle timer thread
pub const DEFAULT_SCHEDULER_THREAD_NAME: &str = "oscar-scheduler";

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Deliver every bundle at once, ignoring its time tag
    pub always_dispatch_immediately: bool,
    /// Name given to the timer thread that runs deferred bundles
    pub scheduler_thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            always_dispatch_immediately: false,
            scheduler_thread_name: DEFAULT_SCHEDULER_THREAD_NAME.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Builder: deliver bundles immediately regardless of time tag
    pub fn immediate(mut self, always: bool) -> Self {
        self.always_dispatch_immediately = always;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert!(!config.always_dispatch_immediately);
        assert_eq!(config.scheduler_thread_name, "oscar-scheduler");
        assert!(DispatcherConfig::default().immediate(true).always_dispatch_immediately);
    }
}
