//! Strategy configuration
//!
//! Every tunable constant of every congestion-control strategy lives here so
//! that callers (and tests) can move thresholds and gates around. The
//! `Default` impls reproduce the contest-tuned values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unknown strategy: {0} (expected mean-variance, loss-rate, copa or fixed)")]
    UnknownStrategy(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn require_timeout(timeout_ms: u64) -> Result<(), ConfigError> {
    if timeout_ms == 0 {
        return Err(invalid("timeout_ms", "must be greater than zero"));
    }
    Ok(())
}

/// Mean/variance gated AIMD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanVarianceConfig {
    /// Window at connection start (datagrams)
    pub initial_window: u32,
    /// RTT at or above which an epoch shrinks the window
    pub rtt_threshold_ms: u64,
    /// Width of the growth gate in standard deviations
    pub variance_gate_sigmas: f64,
    /// Multiplicative decrease numerator
    pub shrink_numerator: u32,
    /// Multiplicative decrease denominator
    pub shrink_denominator: u32,
    /// Divisor applied on a timeout-triggered send
    pub timeout_divisor: u32,
    /// Retransmission timeout
    pub timeout_ms: u64,
}

impl Default for MeanVarianceConfig {
    fn default() -> Self {
        MeanVarianceConfig {
            initial_window: 10,
            rtt_threshold_ms: 130,
            variance_gate_sigmas: 2.0,
            shrink_numerator: 2,
            shrink_denominator: 3,
            timeout_divisor: 3,
            timeout_ms: 250,
        }
    }
}

impl MeanVarianceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_window == 0 {
            return Err(invalid("initial_window", "must be at least 1"));
        }
        if self.shrink_denominator == 0 || self.shrink_numerator >= self.shrink_denominator {
            return Err(invalid(
                "shrink_numerator/shrink_denominator",
                "must be a fraction below 1",
            ));
        }
        if self.timeout_divisor == 0 {
            return Err(invalid("timeout_divisor", "must be at least 1"));
        }
        if !(self.variance_gate_sigmas >= 0.0) {
            return Err(invalid("variance_gate_sigmas", "must be non-negative"));
        }
        require_timeout(self.timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Timeout-frequency model with a Poisson loss gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossRateConfig {
    /// Window at connection start (datagrams)
    pub initial_window: u32,
    /// Scale applied to the timeout ratio to form lambda
    pub loss_scale: f64,
    /// Probability of loss above which the window is halved
    pub loss_probability_gate: f64,
    /// Retransmission timeout
    pub timeout_ms: u64,
}

impl Default for LossRateConfig {
    fn default() -> Self {
        LossRateConfig {
            initial_window: 10,
            loss_scale: 100.0,
            loss_probability_gate: 0.01,
            timeout_ms: 1000,
        }
    }
}

impl LossRateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_window == 0 {
            return Err(invalid("initial_window", "must be at least 1"));
        }
        if !(self.loss_scale > 0.0) {
            return Err(invalid("loss_scale", "must be positive"));
        }
        if !(self.loss_probability_gate > 0.0 && self.loss_probability_gate < 1.0) {
            return Err(invalid("loss_probability_gate", "must lie in (0, 1)"));
        }
        require_timeout(self.timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Delay-gradient policy with velocity, slow start and pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopaConfig {
    /// Window at connection start (datagrams, fractional)
    pub initial_window: f64,
    /// Competitiveness parameter; target rate is 1 / (epsilon * dq)
    pub epsilon: f64,
    /// Smoothed RTT before the first sample
    pub initial_srtt_ms: f64,
    /// Standing and minimum RTT before the first sample
    pub initial_rtt_ms: u64,
    /// Weight of a new sample in the smoothed RTT
    pub srtt_gain: f64,
    /// The per-ack rule only shrinks windows larger than this
    pub min_shrink_window: f64,
    /// Same-direction epochs required before velocity doubles
    pub velocity_run_length: i32,
    /// Ceiling on the step multiplier
    pub max_velocity: f64,
    /// Ceiling on the window (datagrams)
    pub max_window: f64,
    /// Multiplier in the pacing gap, `factor * window / rtt_standing`
    pub pacing_factor: f64,
    /// Pacing deficits at or above this are not slept
    pub max_pacing_delay_ms: f64,
    /// Retransmission timeout
    pub timeout_ms: u64,
}

impl Default for CopaConfig {
    fn default() -> Self {
        CopaConfig {
            initial_window: 10.0,
            epsilon: 0.5,
            initial_srtt_ms: 130.0,
            initial_rtt_ms: 10_000,
            srtt_gain: 0.2,
            min_shrink_window: 5.0,
            velocity_run_length: 3,
            max_velocity: 64.0,
            max_window: 100_000.0,
            pacing_factor: 2.0,
            max_pacing_delay_ms: 1000.0,
            timeout_ms: 1000,
        }
    }
}

impl CopaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_window >= 1.0) {
            return Err(invalid("initial_window", "must be at least 1"));
        }
        if !(self.epsilon > 0.0) {
            return Err(invalid("epsilon", "must be positive"));
        }
        if !(self.srtt_gain > 0.0 && self.srtt_gain <= 1.0) {
            return Err(invalid("srtt_gain", "must lie in (0, 1]"));
        }
        if self.initial_rtt_ms == 0 {
            return Err(invalid("initial_rtt_ms", "must be greater than zero"));
        }
        if self.velocity_run_length < 1 {
            return Err(invalid("velocity_run_length", "must be at least 1"));
        }
        if !(self.max_velocity >= 1.0 && self.max_velocity.is_finite()) {
            return Err(invalid("max_velocity", "must be finite and at least 1"));
        }
        if !(self.max_window >= self.initial_window && self.max_window.is_finite()) {
            return Err(invalid("max_window", "must be finite and at least initial_window"));
        }
        if !(self.pacing_factor >= 0.0) || !(self.max_pacing_delay_ms >= 0.0) {
            return Err(invalid("pacing", "factor and bound must be non-negative"));
        }
        require_timeout(self.timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Constant window, ignores feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedWindowConfig {
    pub window: u32,
    pub timeout_ms: u64,
}

impl Default for FixedWindowConfig {
    fn default() -> Self {
        FixedWindowConfig {
            window: 10,
            timeout_ms: 1000,
        }
    }
}

impl FixedWindowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(invalid("window", "must be at least 1"));
        }
        require_timeout(self.timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    MeanVariance,
    LossRate,
    #[default]
    Copa,
    Fixed,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::MeanVariance => "mean-variance",
            StrategyKind::LossRate => "loss-rate",
            StrategyKind::Copa => "copa",
            StrategyKind::Fixed => "fixed",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean-variance" | "meanvar" => Ok(StrategyKind::MeanVariance),
            "loss-rate" | "loss" => Ok(StrategyKind::LossRate),
            "copa" => Ok(StrategyKind::Copa),
            "fixed" => Ok(StrategyKind::Fixed),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Fully resolved strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StrategyConfig {
    MeanVariance(MeanVarianceConfig),
    LossRate(LossRateConfig),
    Copa(CopaConfig),
    Fixed(FixedWindowConfig),
}

impl StrategyConfig {
    /// Default configuration for the given strategy
    pub fn defaults(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::MeanVariance => StrategyConfig::MeanVariance(Default::default()),
            StrategyKind::LossRate => StrategyConfig::LossRate(Default::default()),
            StrategyKind::Copa => StrategyConfig::Copa(Default::default()),
            StrategyKind::Fixed => StrategyConfig::Fixed(Default::default()),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyConfig::MeanVariance(_) => StrategyKind::MeanVariance,
            StrategyConfig::LossRate(_) => StrategyKind::LossRate,
            StrategyConfig::Copa(_) => StrategyKind::Copa,
            StrategyConfig::Fixed(_) => StrategyKind::Fixed,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyConfig::MeanVariance(c) => c.validate(),
            StrategyConfig::LossRate(c) => c.validate(),
            StrategyConfig::Copa(c) => c.validate(),
            StrategyConfig::Fixed(c) => c.validate(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::defaults(StrategyKind::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        for kind in [
            StrategyKind::MeanVariance,
            StrategyKind::LossRate,
            StrategyKind::Copa,
            StrategyKind::Fixed,
        ] {
            let config = StrategyConfig::defaults(kind);
            assert_eq!(config.kind(), kind);
            assert!(config.validate().is_ok(), "{kind} defaults rejected");
        }
    }

    #[test]
    fn test_default_timeouts() {
        assert_eq!(MeanVarianceConfig::default().timeout(), Duration::from_millis(250));
        assert_eq!(LossRateConfig::default().timeout(), Duration::from_millis(1000));
        assert_eq!(CopaConfig::default().timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("copa".parse::<StrategyKind>().unwrap(), StrategyKind::Copa);
        assert_eq!(
            "meanvar".parse::<StrategyKind>().unwrap(),
            StrategyKind::MeanVariance
        );
        assert_eq!(
            "loss-rate".parse::<StrategyKind>().unwrap(),
            StrategyKind::LossRate
        );
        assert!(matches!(
            "reno".parse::<StrategyKind>(),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        let copa = CopaConfig {
            epsilon: 0.0,
            ..Default::default()
        };
        assert!(copa.validate().is_err());

        for (max_velocity, max_window) in [
            (0.5, 1e5),
            (f64::INFINITY, 1e5),
            (64.0, 5.0),
            (64.0, f64::NAN),
        ] {
            let copa = CopaConfig {
                max_velocity,
                max_window,
                ..Default::default()
            };
            assert!(
                copa.validate().is_err(),
                "accepted max_velocity {max_velocity} max_window {max_window}"
            );
        }

        let loss = LossRateConfig {
            loss_probability_gate: 1.5,
            ..Default::default()
        };
        assert!(loss.validate().is_err());

        let meanvar = MeanVarianceConfig {
            shrink_numerator: 3,
            shrink_denominator: 3,
            ..Default::default()
        };
        assert!(meanvar.validate().is_err());

        let fixed = FixedWindowConfig {
            window: 0,
            ..Default::default()
        };
        assert!(fixed.validate().is_err());
    }

    #[test]
    fn test_toml_partial_table() {
        let config: StrategyConfig = toml::from_str(
            r#"
            kind = "copa"
            epsilon = 0.25
            "#,
        )
        .unwrap();

        match config {
            StrategyConfig::Copa(copa) => {
                assert_eq!(copa.epsilon, 0.25);
                assert_eq!(copa.initial_window, 10.0);
            }
            other => panic!("unexpected config {other:?}"),
        }
    }
}
