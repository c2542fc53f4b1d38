//! Datagrump CLI Library
//!
//! Shared functionality for the sender binary.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, SenderConfig};
pub use stats::{format_bandwidth, format_bytes, format_duration, format_rtt, summary_line};
