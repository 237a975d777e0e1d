//! Closed-form Erlang-B loss-system quantities.
//!
//! With offered intensity `a = request_freq / service_freq` and `N` channels:
//!
//! ```text
//! p_idle   = 1 / sum_{i=0..N} a^i / i!
//! p_reject = (a^N / N!) * p_idle
//! ```
//!
//! The sum loop accumulates `N!` as it goes and the rejection term reuses that
//! value, so both terms are derived from the same factorial.

use serde::Serialize;

use crate::config::{ConfigError, check_frequency};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("loss formula overflowed for {channel_count} channels at intensity {intensity}")]
    NonFinite { channel_count: usize, intensity: f64 },
    #[error("{0} channels exceed the largest supported channel count")]
    TooManyChannels(usize),
}

/// Analytic predictions for one loss system. Recomputed, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalyticResult {
    /// Offered load in erlangs.
    pub intensity: f64,
    /// Probability that every channel is free.
    pub p_idle: f64,
    /// Probability that an arrival finds every channel busy.
    pub p_reject: f64,
    pub relative_throughput: f64,
    /// Served requests per second.
    pub absolute_throughput: f64,
    pub mean_busy_channels: f64,
}

/// Erlang-B evaluator.
pub struct ErlangB;

impl ErlangB {
    pub fn evaluate(
        request_freq: f64,
        service_freq: f64,
        channel_count: usize,
    ) -> Result<AnalyticResult, ModelError> {
        check_frequency("request_freq", request_freq)?;
        check_frequency("service_freq", service_freq)?;
        if channel_count == 0 {
            return Err(ConfigError::NoChannels.into());
        }

        let n = i32::try_from(channel_count)
            .map_err(|_| ModelError::TooManyChannels(channel_count))?;
        let intensity = request_freq / service_freq;

        // i = 0 term: a^0 / 0! = 1
        let mut sum = 1.0;
        let mut factorial = 1.0;
        for i in 1..=n {
            factorial *= f64::from(i);
            sum += intensity.powi(i) / factorial;
        }

        let p_idle = 1.0 / sum;
        let p_reject = (intensity.powi(n) / factorial) * p_idle;

        if !p_idle.is_finite() || !p_reject.is_finite() {
            return Err(ModelError::NonFinite {
                channel_count,
                intensity,
            });
        }

        let relative_throughput = 1.0 - p_reject;
        let absolute_throughput = request_freq * relative_throughput;
        let mean_busy_channels = absolute_throughput / service_freq;

        Ok(AnalyticResult {
            intensity,
            p_idle,
            p_reject,
            relative_throughput,
            absolute_throughput,
            mean_busy_channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn default_parameters_are_in_range() {
        let r = ErlangB::evaluate(10.0, 0.28, 5).unwrap();

        assert!((r.intensity - 35.714_285_714_285_71).abs() < EPS);
        assert!(r.p_idle > 0.0 && r.p_idle < 1e-3);
        assert!(r.p_reject > 0.0 && r.p_reject < 1.0);
        assert_eq!(r.relative_throughput, 1.0 - r.p_reject);
        assert_eq!(r.absolute_throughput, 10.0 * r.relative_throughput);
        assert_eq!(r.mean_busy_channels, r.absolute_throughput / 0.28);
        // At most N channels can be busy on average.
        assert!(r.mean_busy_channels < 5.0);
    }

    #[test]
    fn single_channel_matches_closed_form() {
        let a = 10.0 / 0.28;
        let r = ErlangB::evaluate(10.0, 0.28, 1).unwrap();

        assert!((r.p_idle - 1.0 / (1.0 + a)).abs() < EPS);
        assert!((r.p_reject - a / (1.0 + a)).abs() < EPS);
    }

    #[test]
    fn two_channels_match_hand_computation() {
        // a = 2: sum = 1 + 2 + 2 = 5, p_reject = (4 / 2) / 5
        let r = ErlangB::evaluate(2.0, 1.0, 2).unwrap();
        assert!((r.p_idle - 0.2).abs() < EPS);
        assert!((r.p_reject - 0.4).abs() < EPS);
        assert!((r.mean_busy_channels - 1.2).abs() < EPS);
    }

    #[test]
    fn agrees_with_erlang_recurrence() {
        // B(0) = 1, B(n) = a B(n-1) / (n + a B(n-1))
        let a = 10.0 / 0.28;
        let mut b = 1.0;
        for n in 1..=5 {
            b = a * b / (n as f64 + a * b);
        }
        let r = ErlangB::evaluate(10.0, 0.28, 5).unwrap();
        assert!((r.p_reject - b).abs() < 1e-9);
    }

    #[test]
    fn evaluation_is_bit_identical() {
        let first = ErlangB::evaluate(10.0, 0.28, 5).unwrap();
        let second = ErlangB::evaluate(10.0, 0.28, 5).unwrap();

        assert_eq!(first.p_idle.to_bits(), second.p_idle.to_bits());
        assert_eq!(first.p_reject.to_bits(), second.p_reject.to_bits());
        assert_eq!(
            first.mean_busy_channels.to_bits(),
            second.mean_busy_channels.to_bits()
        );
        assert_eq!(first, second);
    }

    #[test]
    fn zero_channels_is_a_config_error() {
        assert_eq!(
            ErlangB::evaluate(10.0, 0.28, 0),
            Err(ModelError::Config(ConfigError::NoChannels))
        );
    }

    #[test]
    fn zero_frequency_is_a_config_error() {
        assert!(matches!(
            ErlangB::evaluate(10.0, 0.0, 5),
            Err(ModelError::Config(ConfigError::InvalidFrequency { .. }))
        ));
    }

    #[test]
    fn overflow_is_reported() {
        let err = ErlangB::evaluate(1000.0, 1.0, 400).unwrap_err();
        assert!(matches!(err, ModelError::NonFinite { .. }));
    }

    #[test]
    fn channel_count_beyond_exponent_range_is_rejected() {
        let channels = i32::MAX as usize + 1;
        assert_eq!(
            ErlangB::evaluate(10.0, 0.28, channels),
            Err(ModelError::TooManyChannels(channels))
        );
        assert_eq!(
            ErlangB::evaluate(10.0, 0.28, usize::MAX),
            Err(ModelError::TooManyChannels(usize::MAX))
        );
    }

    #[test]
    fn serializes_all_quantities() {
        let r = ErlangB::evaluate(2.0, 1.0, 2).unwrap();
        let json = serde_json::to_value(r).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "absolute_throughput",
                "intensity",
                "mean_busy_channels",
                "p_idle",
                "p_reject",
                "relative_throughput",
            ]
        );
    }
}
