use std::sync::Arc;
use std::time::Duration;

use foreman_actor::RetryStrategy;
use foreman_common::config::AppConfig;

use crate::rpc::DispatcherClient;
use crate::worker::solver::PartialSolver;

pub struct WorkerOptions {
    pub dispatcher: Arc<dyn DispatcherClient>,
    pub solver: Arc<dyn PartialSolver>,
    /// The retry budget for returning a computed solution before the
    /// failure is reported to the dispatcher.
    pub result_retry: RetryStrategy,
}

impl WorkerOptions {
    pub fn new(
        config: &AppConfig,
        dispatcher: Arc<dyn DispatcherClient>,
        solver: Arc<dyn PartialSolver>,
    ) -> Self {
        Self {
            dispatcher,
            solver,
            result_retry: RetryStrategy::Fixed {
                max_count: config.worker.result_retry_count,
                delay: Duration::from_secs(config.worker.result_retry_delay_secs),
            },
        }
    }

    /// Options with the built-in retry budget, for in-process operatives.
    pub fn local(dispatcher: Arc<dyn DispatcherClient>, solver: Arc<dyn PartialSolver>) -> Self {
        Self {
            dispatcher,
            solver,
            result_retry: RetryStrategy::Fixed {
                max_count: 3,
                delay: Duration::from_secs(3),
            },
        }
    }
}
