//! Configuration file support for the sender

use datagrump_protocol::message::{check_payload_size, DEFAULT_PAYLOAD_SIZE};
use datagrump_protocol::{
    CopaConfig, FixedWindowConfig, LossRateConfig, MeanVarianceConfig, StrategyConfig,
    StrategyKind,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Sender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Congestion-control strategy to run
    pub strategy: StrategyKind,
    /// Filler bytes carried by each data datagram
    pub payload_size: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            strategy: StrategyKind::default(),
            payload_size: DEFAULT_PAYLOAD_SIZE,
        }
    }
}

/// Combined configuration: the `[sender]` table plus one table per strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sender: SenderConfig,
    pub mean_variance: MeanVarianceConfig,
    pub loss_rate: LossRateConfig,
    pub copa: CopaConfig,
    pub fixed: FixedWindowConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Example configuration with every field spelled out
    pub fn example() -> Self {
        Config::default()
    }

    /// Strategy parameters for `kind`, taken from its table
    pub fn strategy_config(&self, kind: StrategyKind) -> StrategyConfig {
        match kind {
            StrategyKind::MeanVariance => StrategyConfig::MeanVariance(self.mean_variance.clone()),
            StrategyKind::LossRate => StrategyConfig::LossRate(self.loss_rate.clone()),
            StrategyKind::Copa => StrategyConfig::Copa(self.copa.clone()),
            StrategyKind::Fixed => StrategyConfig::Fixed(self.fixed.clone()),
        }
    }

    /// Validate the selected strategy and the payload size
    pub fn validate(&self) -> Result<StrategyConfig, ConfigError> {
        check_payload_size(self.sender.payload_size)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let strategy = self.strategy_config(self.sender.strategy);
        strategy
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(strategy)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config() {
        let config = Config::example();
        assert_eq!(config.sender.strategy, StrategyKind::Copa);
        assert_eq!(config.sender.payload_size, DEFAULT_PAYLOAD_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = Config::example();
        let toml = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&toml).unwrap();

        assert_eq!(parsed.sender.strategy, config.sender.strategy);
        assert_eq!(parsed.copa.epsilon, config.copa.epsilon);
        assert_eq!(parsed.mean_variance.timeout_ms, 250);
    }

    #[test]
    fn test_partial_tables() {
        let config = Config::from_toml(
            r#"
            [sender]
            strategy = "loss-rate"

            [loss_rate]
            loss_probability_gate = 0.05
            "#,
        )
        .unwrap();

        match config.validate().unwrap() {
            StrategyConfig::LossRate(loss) => {
                assert_eq!(loss.loss_probability_gate, 0.05);
                assert_eq!(loss.initial_window, 10);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::example();
        config.copa.epsilon = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::example();
        config.sender.payload_size = 100_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = Config::from_toml("[sender]\nstrategy = \"vegas\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("datagrump-{}.toml", std::process::id()));
        let mut config = Config::example();
        config.sender.strategy = StrategyKind::Fixed;
        config.fixed.window = 42;

        config.to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.sender.strategy, StrategyKind::Fixed);
        assert_eq!(loaded.fixed.window, 42);
    }
}
