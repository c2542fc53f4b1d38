//! Mean/variance gated AIMD
//!
//! RTT samples feed a running mean and variance. Once per epoch (one
//! window's worth of acks) the window either shrinks multiplicatively when
//! the latest RTT crosses a fixed threshold, or grows by one when the RTT is
//! within a few standard deviations of the mean. A timeout-triggered send
//! cuts the window immediately.

use crate::config::{MeanVarianceConfig, StrategyKind};
use crate::congestion::{AckEvent, CongestionController, CongestionStats, SendEvent, MIN_WINDOW};
use crate::rtt::RunningRttStats;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MeanVarianceStrategy {
    config: MeanVarianceConfig,
    window: u32,
    stats: RunningRttStats,
    /// Acks seen in the current epoch
    packet_counter: u32,
}

impl MeanVarianceStrategy {
    pub fn new(config: MeanVarianceConfig) -> Self {
        MeanVarianceStrategy {
            window: config.initial_window.max(MIN_WINDOW),
            config,
            stats: RunningRttStats::new(),
            packet_counter: 0,
        }
    }

    /// Running RTT statistics
    pub fn rtt_stats(&self) -> &RunningRttStats {
        &self.stats
    }

    pub fn packet_counter(&self) -> u32 {
        self.packet_counter
    }

    fn end_epoch(&mut self, rtt_ms: u64) {
        if rtt_ms >= self.config.rtt_threshold_ms {
            // u64 keeps the multiplication from overflowing on huge windows
            let shrunk = self.window as u64 * self.config.shrink_numerator as u64
                / self.config.shrink_denominator as u64;
            self.window = shrunk as u32;
        } else {
            let gate = self.stats.mean() + self.config.variance_gate_sigmas * self.stats.std_dev();
            if rtt_ms as f64 <= gate {
                self.window = self.window.saturating_add(1);
            }
        }
        self.window = self.window.max(MIN_WINDOW);
        self.packet_counter = 0;
        tracing::trace!(window = self.window, rtt_ms, "mean-variance epoch");
    }
}

impl Default for MeanVarianceStrategy {
    fn default() -> Self {
        Self::new(MeanVarianceConfig::default())
    }
}

impl CongestionController for MeanVarianceStrategy {
    fn current_window(&self) -> u32 {
        self.window.max(MIN_WINDOW)
    }

    fn on_datagram_sent(&mut self, event: &SendEvent) {
        if event.after_timeout {
            self.window = (self.window / self.config.timeout_divisor).max(MIN_WINDOW);
        }
    }

    fn on_ack_received(&mut self, event: &AckEvent) {
        let rtt = event.current_rtt();
        self.stats.update(rtt);

        self.packet_counter += 1;
        if self.packet_counter >= self.window {
            self.end_epoch(rtt);
        }
    }

    fn retransmission_timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn stats(&self) -> CongestionStats {
        CongestionStats {
            rtt_ms: (self.stats.count() > 0).then(|| self.stats.mean()),
            ..CongestionStats::basic(
                StrategyKind::MeanVariance,
                self.window as f64,
                self.retransmission_timeout(),
            )
        }
    }
}
