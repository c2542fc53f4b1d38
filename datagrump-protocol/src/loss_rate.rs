//! Timeout-frequency window policy
//!
//! The fraction of sends triggered by a retransmission timeout stands in for
//! the loss rate. Treating losses as Poisson arrivals with rate
//! `lambda = scale * timeouts / sent`, the probability of at least one loss is
//! `1 - e^(-lambda)`; above the gate every ack halves the window. Otherwise
//! the window grows by one per epoch.

use crate::config::{LossRateConfig, StrategyKind};
use crate::congestion::{AckEvent, CongestionController, CongestionStats, SendEvent, MIN_WINDOW};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LossRateStrategy {
    config: LossRateConfig,
    window: u32,
    timeouts: u64,
    datagrams_sent: u64,
    packet_counter: u32,
}

impl LossRateStrategy {
    pub fn new(config: LossRateConfig) -> Self {
        LossRateStrategy {
            window: config.initial_window.max(MIN_WINDOW),
            config,
            timeouts: 0,
            datagrams_sent: 0,
            packet_counter: 0,
        }
    }

    /// Loss-rate estimate; zero before anything has been sent
    pub fn loss_rate(&self) -> f64 {
        if self.datagrams_sent == 0 {
            return 0.0;
        }
        self.config.loss_scale * self.timeouts as f64 / self.datagrams_sent as f64
    }

    /// Probability of at least one loss under the Poisson model
    pub fn loss_probability(&self) -> f64 {
        1.0 - (-self.loss_rate()).exp()
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent
    }

    pub fn packet_counter(&self) -> u32 {
        self.packet_counter
    }
}

impl Default for LossRateStrategy {
    fn default() -> Self {
        Self::new(LossRateConfig::default())
    }
}

impl CongestionController for LossRateStrategy {
    fn current_window(&self) -> u32 {
        self.window.max(MIN_WINDOW)
    }

    fn on_datagram_sent(&mut self, event: &SendEvent) {
        self.datagrams_sent += 1;
        if event.after_timeout {
            self.timeouts += 1;
        }
    }

    fn on_ack_received(&mut self, _event: &AckEvent) {
        if self.loss_probability() > self.config.loss_probability_gate {
            self.window = (self.window / 2).max(MIN_WINDOW);
            self.packet_counter = 0;
            return;
        }

        self.packet_counter += 1;
        if self.packet_counter >= self.window {
            self.window = self.window.saturating_add(1);
            self.packet_counter = 0;
        }
    }

    fn retransmission_timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn stats(&self) -> CongestionStats {
        CongestionStats::basic(
            StrategyKind::LossRate,
            self.window as f64,
            self.retransmission_timeout(),
        )
    }
}
