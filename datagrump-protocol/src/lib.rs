//! Datagrump Protocol Core
//!
//! This crate implements the sending-side congestion-control core of the
//! datagram transfer contest: the wire message format, RTT signal
//! estimation, and the interchangeable window strategies behind the
//! [`CongestionController`] contract.

pub mod config;
pub mod congestion;
pub mod copa;
pub mod fixed;
pub mod loss_rate;
pub mod mean_variance;
pub mod message;
pub mod rtt;

pub use config::{
    ConfigError, CopaConfig, FixedWindowConfig, LossRateConfig, MeanVarianceConfig,
    StrategyConfig, StrategyKind,
};
pub use congestion::{AckEvent, CongestionController, CongestionStats, SendEvent, Strategy};
pub use copa::CopaStrategy;
pub use fixed::FixedWindowStrategy;
pub use loss_rate::LossRateStrategy;
pub use mean_variance::MeanVarianceStrategy;
pub use message::{Message, MessageError, MessageHeader, MessageKind};
pub use rtt::{DelaySignals, RunningRttStats};
