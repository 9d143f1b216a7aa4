use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub dispatcher: DispatcherConfig,
    pub worker: WorkerConfig,
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Loads the configuration from the embedded defaults,
    /// overridden by `FOREMAN__SECTION__KEY` environment variables.
    pub fn load() -> CommonResult<Self> {
        Figment::from(Toml::string(DEFAULT_CONFIG))
            .admerge(Env::prefixed("FOREMAN__").map(|p| p.as_str().replace("__", ".").into()))
            .extract()
            .map_err(|e| CommonError::InvalidArgument(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// The interval between reachability probes for each registered operative.
    pub probe_interval_secs: u64,
    /// The number of consecutive failed probes after which an operative
    /// is declared dead.
    pub probe_retries: usize,
    /// The minimum suggested batch size when asking a problem for more items.
    pub batch_floor: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// The number of times an operative retries returning a partial solution
    /// before reporting the failure to the dispatcher.
    pub result_retry_count: usize,
    /// The delay between result delivery retries.
    pub result_retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    pub worker_count: usize,
    pub range_end: u64,
    pub chunk_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.dispatcher.probe_interval_secs, 10);
        assert_eq!(config.dispatcher.probe_retries, 3);
        assert!(config.dispatcher.batch_floor >= 1);
        assert_eq!(config.worker.result_retry_count, 3);
        assert_eq!(config.worker.result_retry_delay_secs, 3);
    }
}
