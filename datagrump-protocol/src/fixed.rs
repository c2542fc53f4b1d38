//! Fixed window baseline
//!
//! Keeps a constant number of datagrams in flight regardless of feedback.
//! Sweeping the window across runs and scoring `ln(throughput / delay)` is
//! the usual way to find the best static operating point.

use crate::config::{FixedWindowConfig, StrategyKind};
use crate::congestion::{AckEvent, CongestionController, CongestionStats, SendEvent, MIN_WINDOW};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FixedWindowStrategy {
    config: FixedWindowConfig,
}

impl FixedWindowStrategy {
    pub fn new(config: FixedWindowConfig) -> Self {
        FixedWindowStrategy { config }
    }
}

impl Default for FixedWindowStrategy {
    fn default() -> Self {
        Self::new(FixedWindowConfig::default())
    }
}

impl CongestionController for FixedWindowStrategy {
    fn current_window(&self) -> u32 {
        self.config.window.max(MIN_WINDOW)
    }

    fn on_datagram_sent(&mut self, _event: &SendEvent) {}

    fn on_ack_received(&mut self, _event: &AckEvent) {}

    fn retransmission_timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn stats(&self) -> CongestionStats {
        CongestionStats::basic(
            StrategyKind::Fixed,
            self.current_window() as f64,
            self.retransmission_timeout(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_ignores_feedback() {
        let mut cc = FixedWindowStrategy::new(FixedWindowConfig {
            window: 25,
            timeout_ms: 500,
        });
        cc.on_datagram_sent(&SendEvent {
            sequence_number: 0,
            send_timestamp: 0,
            after_timeout: true,
        });
        cc.on_ack_received(&AckEvent {
            acked_sequence_number: 0,
            send_timestamp_acked: 0,
            recv_timestamp_acked: 300,
            ack_received_timestamp: 900,
        });
        assert_eq!(cc.current_window(), 25);
        assert_eq!(cc.retransmission_timeout(), Duration::from_millis(500));
    }
}
