use std::time::Duration;

use foreman_common::config::AppConfig;

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// The interval between reachability probes for each operative.
    pub probe_interval: Duration,
    /// The number of consecutive failed probes after which an operative is
    /// declared dead and its work is reclaimed.
    pub probe_retries: usize,
    /// The minimum suggested batch size when asking a problem to decompose
    /// further.
    pub batch_floor: usize,
}

impl DispatcherOptions {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            probe_interval: Duration::from_secs(config.dispatcher.probe_interval_secs),
            probe_retries: config.dispatcher.probe_retries,
            batch_floor: config.dispatcher.batch_floor.max(1),
        }
    }
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(10),
            probe_retries: 3,
            batch_floor: 1,
        }
    }
}
