//! Registry configuration

use std::time::Duration;

/// Configuration for the connection registry and its reaper
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum silence before a connected source is evicted
    pub liveness_window: Duration,

    /// How often the reaper sweeps for stale sources
    pub sweep_interval: Duration,

    /// Capacity of the "registry changed" broadcast channel
    pub change_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            liveness_window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            change_capacity: 64,
        }
    }
}

impl RegistryConfig {
    /// Set the liveness window
    pub fn liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    /// Set the sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the change channel capacity (minimum 1)
    pub fn change_capacity(mut self, capacity: usize) -> Self {
        self.change_capacity = capacity.max(1);
        self
    }
}
