//! Final report: observed counters next to the analytic predictions.

use std::fmt;

use serde::Serialize;

use crate::admission::PoolSnapshot;
use crate::config::SimulationConfig;
use crate::model::AnalyticResult;

/// Immutable result of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    config: SimulationConfig,
    observed: PoolSnapshot,
    analytic: AnalyticResult,
}

impl SimulationReport {
    pub fn assemble(
        config: SimulationConfig,
        observed: PoolSnapshot,
        analytic: AnalyticResult,
    ) -> Self {
        Self {
            config,
            observed,
            analytic,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn observed(&self) -> &PoolSnapshot {
        &self.observed
    }

    pub fn analytic(&self) -> &AnalyticResult {
        &self.analytic
    }

    /// Fraction of requests rejected during the run, to compare with `p_reject`.
    pub fn observed_rejection_ratio(&self) -> f64 {
        if self.observed.request_count == 0 {
            return 0.0;
        }
        self.observed.rejected_count as f64 / self.observed.request_count as f64
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let observed = &self.observed;
        let analytic = &self.analytic;

        writeln!(f, "Total requests: {}", observed.request_count)?;
        writeln!(f, "Processed requests: {}", observed.processed_count)?;
        writeln!(f, "Rejected requests: {}", observed.rejected_count)?;
        writeln!(f, "Idle probability: {:.6}", analytic.p_idle)?;
        writeln!(f, "Rejection probability: {:.6}", analytic.p_reject)?;
        writeln!(f, "Relative throughput: {:.6}", analytic.relative_throughput)?;
        writeln!(f, "Absolute throughput: {:.6}", analytic.absolute_throughput)?;
        write!(f, "Mean busy channels: {:.6}", analytic.mean_busy_channels)
    }
}
