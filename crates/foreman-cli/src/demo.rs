use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::info;
use tokio::sync::Notify;

use foreman_actor::actor::ActorSystem;
use foreman_common::config::AppConfig;
use foreman_compute::dispatcher::{ComputeManager, DispatcherOptions};
use foreman_compute::error::ComputeResult;
use foreman_compute::problem::Problem;
use foreman_compute::rpc::{MessageCode, TransmitterClient};
use foreman_compute::stats::ProblemReport;
use foreman_compute::worker::{Operative, WorkerOptions};

use crate::problem::{PrimeCountProblem, PrimeSolver};

/// Waits for the single outcome of a submitted problem: either the final
/// result or a structured failure message.
#[derive(Default)]
struct WaitingTransmitter {
    outcome: Mutex<Option<Result<(Vec<u8>, ProblemReport), String>>>,
    notify: Notify,
}

impl WaitingTransmitter {
    async fn wait(&self) -> Result<(Vec<u8>, ProblemReport), String> {
        loop {
            let notified = self.notify.notified();
            if let Some(outcome) = self.outcome.lock().unwrap().clone() {
                return outcome;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl TransmitterClient for WaitingTransmitter {
    async fn deliver_result(
        &self,
        result: Vec<u8>,
        statistics: ProblemReport,
    ) -> ComputeResult<()> {
        *self.outcome.lock().unwrap() = Some(Ok((result, statistics)));
        self.notify.notify_waiters();
        Ok(())
    }

    async fn deliver_message(&self, code: MessageCode, text: String) -> ComputeResult<()> {
        *self.outcome.lock().unwrap() = Some(Err(format!("{code}: {text}")));
        self.notify.notify_waiters();
        Ok(())
    }
}

pub fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut system = ActorSystem::new();
    let manager = ComputeManager::start(&mut system, DispatcherOptions::new(&config));
    let mut operatives = vec![];
    for _ in 0..config.demo.worker_count.max(1) {
        operatives.push(Operative::start(
            &mut system,
            WorkerOptions::new(&config, manager.client(), Arc::new(PrimeSolver)),
        ));
    }

    let problem: Box<dyn Problem> = Box::new(PrimeCountProblem::new(
        config.demo.range_end,
        config.demo.chunk_size,
    ));
    let transmitter = Arc::new(WaitingTransmitter::default());
    let problem_id = manager.submit_problem(problem, transmitter.clone()).await?;
    info!(
        "problem {problem_id} submitted across {} operatives",
        operatives.len()
    );

    let (result, report) = transmitter.wait().await?;
    let count: u64 = serde_json::from_slice(&result)?;
    println!("{count} primes below {}", config.demo.range_end);
    println!(
        "computed {} items in {} ms (average {} ms per item)",
        report.computed_items,
        report.total_computation_time_ms,
        report.average_computation_time_ms.unwrap_or(0),
    );

    let system_report = manager.system_statistics().await?;
    println!("{}", serde_json::to_string_pretty(&system_report)?);

    manager.shutdown().await?;
    system.join().await;
    Ok(())
}
