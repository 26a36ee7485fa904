//! Engine tuning knobs.

use std::time::Duration;

use pagerule_domain::stats::DEFAULT_TIME_SAVED_PER_EXECUTION_SECS;

/// Timings and estimates used by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period after the last content change before triggers are
    /// checked.
    pub content_debounce: Duration,
    /// Quiet period after the last in-page navigation.
    pub navigation_debounce: Duration,
    /// How often `time_based` rules re-check their schedule.
    pub schedule_poll_interval: Duration,
    /// Flat credit per successful execution in the stats estimate.
    pub time_saved_per_execution_secs: u64,
    /// Capacity of the execution broadcast channel.
    pub execution_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            content_debounce: Duration::from_millis(1000),
            navigation_debounce: Duration::from_millis(250),
            schedule_poll_interval: Duration::from_secs(60),
            time_saved_per_execution_secs: DEFAULT_TIME_SAVED_PER_EXECUTION_SECS,
            execution_channel_capacity: 64,
        }
    }
}
