//! Simulation constants and their validation.

use std::time::Duration;

use serde::Serialize;

/// Arrival rate of the default run, in requests per second.
pub const REQUEST_FREQ: f64 = 10.0;
/// Service rate of one channel in the default run, in services per second.
pub const SERVICE_FREQ: f64 = 0.28;
/// Number of worker slots in the default run.
pub const CHANNEL_COUNT: usize = 5;
/// Number of requests the default run generates.
pub const TOTAL_REQUESTS: u64 = 100;

/// Invalid simulation constants. Raised before any request is generated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("channel count must be at least 1")]
    NoChannels,
    #[error("{name} must be a finite positive number, got {value}")]
    InvalidFrequency { name: &'static str, value: f64 },
    #[error("total request count must be at least 1")]
    NoRequests,
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    /// Requests generated per second.
    pub request_freq: f64,
    /// Services completed per second by one channel.
    pub service_freq: f64,
    /// Number of channels (worker slots).
    pub channel_count: usize,
    /// Number of requests to generate before stopping.
    pub total_requests: u64,
    /// Upper bound on how long to wait for in-flight workers after generation.
    /// `None` means one service interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_timeout: Option<Duration>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            request_freq: REQUEST_FREQ,
            service_freq: SERVICE_FREQ,
            channel_count: CHANNEL_COUNT,
            total_requests: TOTAL_REQUESTS,
            settle_timeout: None,
        }
    }
}

impl SimulationConfig {
    pub fn with_channels(mut self, channel_count: usize) -> Self {
        self.channel_count = channel_count;
        self
    }

    pub fn with_frequencies(mut self, request_freq: f64, service_freq: f64) -> Self {
        self.request_freq = request_freq;
        self.service_freq = service_freq;
        self
    }

    pub fn with_total_requests(mut self, total_requests: u64) -> Self {
        self.total_requests = total_requests;
        self
    }

    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = Some(timeout);
        self
    }

    /// Check every constant. Must pass before the run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_frequency("request_freq", self.request_freq)?;
        check_frequency("service_freq", self.service_freq)?;
        if self.channel_count == 0 {
            return Err(ConfigError::NoChannels);
        }
        if self.total_requests == 0 {
            return Err(ConfigError::NoRequests);
        }
        Ok(())
    }

    /// Spacing between generated requests, truncated to whole milliseconds.
    pub fn request_interval(&self) -> Duration {
        interval_for(self.request_freq)
    }

    /// Time one admitted request occupies its slot, truncated to whole milliseconds.
    pub fn service_interval(&self) -> Duration {
        interval_for(self.service_freq)
    }

    /// Offered load in erlangs.
    pub fn intensity(&self) -> f64 {
        self.request_freq / self.service_freq
    }

    pub fn settle_timeout(&self) -> Duration {
        self.settle_timeout.unwrap_or_else(|| self.service_interval())
    }
}

pub(crate) fn check_frequency(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidFrequency { name, value })
    }
}

fn interval_for(freq: f64) -> Duration {
    Duration::from_millis((1000.0 / freq) as u64)
}
