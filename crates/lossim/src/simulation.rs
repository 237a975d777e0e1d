//! Simulation orchestrator - wires the generator to the pool and assembles the report.
//!
//! Flow:
//! 1. Validate config, evaluate the analytic model (fail fast)
//! 2. Build the pool, run the generator against it
//! 3. Settle: wait for in-flight workers, bounded by the settle timeout
//! 4. Shut the pool down (cancel stragglers, join workers)
//! 5. Assemble the report
//!
//! A dead worker ends steps 2 and 3 at once; step 4 then returns its error.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::admission::{PoolError, WorkerPool};
use crate::clock::Clock;
use crate::config::{ConfigError, SimulationConfig};
use crate::generator::RequestGenerator;
use crate::model::{ErlangB, ModelError};
use crate::report::SimulationReport;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("analytic model: {0}")]
    Model(#[from] ModelError),
    #[error("worker pool: {0}")]
    Pool(#[from] PoolError),
}

pub struct Simulation {
    config: SimulationConfig,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl Simulation {
    pub fn new(config: SimulationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Token that stops generation early when cancelled. The report is still
    /// assembled from the requests submitted so far.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&self) -> Result<SimulationReport, SimulationError> {
        let config = &self.config;
        config.validate()?;
        let analytic = ErlangB::evaluate(
            config.request_freq,
            config.service_freq,
            config.channel_count,
        )?;

        tracing::info!(
            channels = config.channel_count,
            requests = config.total_requests,
            request_interval = ?config.request_interval(),
            service_interval = ?config.service_interval(),
            intensity = analytic.intensity,
            "Starting simulation"
        );

        let pool = WorkerPool::new(
            config.channel_count,
            config.service_interval(),
            Arc::clone(&self.clock),
        )?;
        let generator = RequestGenerator::new(
            config.total_requests,
            config.request_interval(),
            Arc::clone(&self.clock),
        );

        let generation = tokio::select! {
            summary = generator.run(&pool, &self.shutdown) => Some(summary),
            _ = pool.failed() => None,
        };

        match generation {
            Some(summary) => {
                tracing::info!(
                    submitted = summary.submitted,
                    accepted = summary.accepted,
                    rejected = summary.rejected,
                    "Generation finished"
                );
                self.settle(&pool).await;
            }
            None => tracing::error!("Worker failed - generation abandoned"),
        }

        let observed = pool.shutdown().await?;
        debug_assert!(observed.is_consistent());

        tracing::info!(
            processed = observed.processed_count,
            rejected = observed.rejected_count,
            peak_busy = observed.peak_busy,
            "Simulation finished"
        );

        Ok(SimulationReport::assemble(config.clone(), observed, analytic))
    }

    /// Wait for in-flight workers, bounded by the settle timeout.
    async fn settle(&self, pool: &WorkerPool) {
        let settle = self.config.settle_timeout();
        tokio::select! {
            _ = pool.wait_idle() => tracing::debug!("All workers settled"),
            _ = self.clock.sleep(settle) => {
                tracing::warn!(timeout = ?settle, busy = pool.snapshot().busy, "Settle timeout elapsed");
            }
            _ = self.shutdown.cancelled() => tracing::debug!("Settling skipped on shutdown"),
            _ = pool.failed() => tracing::error!("Worker failed while settling"),
        }
    }
}
