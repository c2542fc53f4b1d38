//! Congestion Control for Datagrump
//!
//! Defines the [`CongestionController`] contract shared by every window
//! strategy, the send/ack events the strategies consume, and [`Strategy`],
//! the closed set of strategies selectable at connection construction.

use crate::config::{StrategyConfig, StrategyKind};
use crate::copa::CopaStrategy;
use crate::fixed::FixedWindowStrategy;
use crate::loss_rate::LossRateStrategy;
use crate::mean_variance::MeanVarianceStrategy;
use std::time::Duration;

/// Smallest window any strategy will report
pub const MIN_WINDOW: u32 = 1;

/// A datagram left the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendEvent {
    /// Sequence number of the sent datagram
    pub sequence_number: u64,
    /// When it was sent (sender clock, ms)
    pub send_timestamp: u64,
    /// Whether it was sent because the retransmission timeout expired
    pub after_timeout: bool,
}

/// An acknowledgement arrived at the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckEvent {
    /// Sequence number acknowledged
    pub acked_sequence_number: u64,
    /// When the acknowledged datagram was sent (sender clock, ms)
    pub send_timestamp_acked: u64,
    /// When the acknowledged datagram arrived (receiver clock, ms)
    pub recv_timestamp_acked: u64,
    /// When the acknowledgement arrived (sender clock, ms)
    pub ack_received_timestamp: u64,
}

impl AckEvent {
    /// Round-trip time of the acknowledged datagram.
    ///
    /// Both timestamps come from the sender clock; a reading that went
    /// backwards yields zero rather than wrapping.
    #[inline]
    pub fn current_rtt(&self) -> u64 {
        self.ack_received_timestamp
            .saturating_sub(self.send_timestamp_acked)
    }
}

/// Window and timing policy driven by send/ack events.
///
/// Implementations never block; every operation is O(1).
pub trait CongestionController {
    /// Number of datagrams allowed in flight right now (never below 1)
    fn current_window(&self) -> u32;

    /// Record that a datagram left the sender
    fn on_datagram_sent(&mut self, event: &SendEvent);

    /// Update window and RTT state from an acknowledgement
    fn on_ack_received(&mut self, event: &AckEvent);

    /// How long to wait for any event before a timeout-triggered send
    fn retransmission_timeout(&self) -> Duration;

    /// Delay to impose before the next send at `now_ms`
    fn pacing_delay(&self, _now_ms: u64) -> Duration {
        Duration::ZERO
    }

    /// Snapshot for diagnostics
    fn stats(&self) -> CongestionStats;
}

/// Congestion control statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CongestionStats {
    /// Which strategy produced this snapshot
    pub strategy: StrategyKind,
    /// Internal (possibly fractional) window
    pub window: f64,
    /// Retransmission timeout
    pub timeout: Duration,
    /// Smoothed or mean RTT, if the strategy tracks one (ms)
    pub rtt_ms: Option<f64>,
    /// Minimum RTT, if the strategy tracks one (ms)
    pub rtt_min_ms: Option<u64>,
    /// Whether the strategy is in slow start
    pub slow_start: bool,
}

impl CongestionStats {
    pub(crate) fn basic(strategy: StrategyKind, window: f64, timeout: Duration) -> Self {
        CongestionStats {
            strategy,
            window,
            timeout,
            rtt_ms: None,
            rtt_min_ms: None,
            slow_start: false,
        }
    }
}

/// Truncate a fractional window to whole datagrams, never below [`MIN_WINDOW`]
#[inline]
pub fn truncate_window(window: f64) -> u32 {
    if window.is_nan() || window < MIN_WINDOW as f64 {
        return MIN_WINDOW;
    }
    // `as` saturates at u32::MAX
    window as u32
}

/// One of the available strategies, selected at construction
#[derive(Debug, Clone)]
pub enum Strategy {
    MeanVariance(MeanVarianceStrategy),
    LossRate(LossRateStrategy),
    Copa(CopaStrategy),
    Fixed(FixedWindowStrategy),
}

impl Strategy {
    /// Build the strategy described by `config`
    pub fn from_config(config: &StrategyConfig) -> Self {
        match config {
            StrategyConfig::MeanVariance(c) => {
                Strategy::MeanVariance(MeanVarianceStrategy::new(c.clone()))
            }
            StrategyConfig::LossRate(c) => Strategy::LossRate(LossRateStrategy::new(c.clone())),
            StrategyConfig::Copa(c) => Strategy::Copa(CopaStrategy::new(c.clone())),
            StrategyConfig::Fixed(c) => Strategy::Fixed(FixedWindowStrategy::new(c.clone())),
        }
    }

    /// Build a strategy with default settings
    pub fn with_defaults(kind: StrategyKind) -> Self {
        Self::from_config(&StrategyConfig::defaults(kind))
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::MeanVariance(_) => StrategyKind::MeanVariance,
            Strategy::LossRate(_) => StrategyKind::LossRate,
            Strategy::Copa(_) => StrategyKind::Copa,
            Strategy::Fixed(_) => StrategyKind::Fixed,
        }
    }

    fn as_controller(&self) -> &dyn CongestionController {
        match self {
            Strategy::MeanVariance(s) => s,
            Strategy::LossRate(s) => s,
            Strategy::Copa(s) => s,
            Strategy::Fixed(s) => s,
        }
    }

    fn as_controller_mut(&mut self) -> &mut dyn CongestionController {
        match self {
            Strategy::MeanVariance(s) => s,
            Strategy::LossRate(s) => s,
            Strategy::Copa(s) => s,
            Strategy::Fixed(s) => s,
        }
    }
}

impl CongestionController for Strategy {
    fn current_window(&self) -> u32 {
        self.as_controller().current_window()
    }

    fn on_datagram_sent(&mut self, event: &SendEvent) {
        self.as_controller_mut().on_datagram_sent(event)
    }

    fn on_ack_received(&mut self, event: &AckEvent) {
        self.as_controller_mut().on_ack_received(event)
    }

    fn retransmission_timeout(&self) -> Duration {
        self.as_controller().retransmission_timeout()
    }

    fn pacing_delay(&self, now_ms: u64) -> Duration {
        self.as_controller().pacing_delay(now_ms)
    }

    fn stats(&self) -> CongestionStats {
        self.as_controller().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(seq: u64, sent: u64, received: u64) -> AckEvent {
        AckEvent {
            acked_sequence_number: seq,
            send_timestamp_acked: sent,
            recv_timestamp_acked: sent + (received - sent) / 2,
            ack_received_timestamp: received,
        }
    }

    #[test]
    fn test_current_rtt() {
        assert_eq!(ack(0, 1000, 1080).current_rtt(), 80);
    }

    #[test]
    fn test_current_rtt_clock_regression() {
        let event = AckEvent {
            acked_sequence_number: 0,
            send_timestamp_acked: 1000,
            recv_timestamp_acked: 0,
            ack_received_timestamp: 999,
        };
        assert_eq!(event.current_rtt(), 0);
    }

    #[test]
    fn test_truncate_window() {
        assert_eq!(truncate_window(10.9), 10);
        assert_eq!(truncate_window(1.0), 1);
        assert_eq!(truncate_window(0.3), MIN_WINDOW);
        assert_eq!(truncate_window(-4.0), MIN_WINDOW);
        assert_eq!(truncate_window(f64::NAN), MIN_WINDOW);
    }

    #[test]
    fn test_strategy_dispatch() {
        for kind in [
            StrategyKind::MeanVariance,
            StrategyKind::LossRate,
            StrategyKind::Copa,
            StrategyKind::Fixed,
        ] {
            let strategy = Strategy::with_defaults(kind);
            assert_eq!(strategy.kind(), kind);
            assert_eq!(strategy.stats().strategy, kind);
            assert_eq!(strategy.current_window(), 10);
        }
    }

    #[test]
    fn test_strategy_timeouts() {
        assert_eq!(
            Strategy::with_defaults(StrategyKind::MeanVariance).retransmission_timeout(),
            Duration::from_millis(250)
        );
        assert_eq!(
            Strategy::with_defaults(StrategyKind::LossRate).retransmission_timeout(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_strategy_forwards_events() {
        let mut strategy = Strategy::with_defaults(StrategyKind::MeanVariance);
        strategy.on_datagram_sent(&SendEvent {
            sequence_number: 0,
            send_timestamp: 0,
            after_timeout: true,
        });
        assert_eq!(strategy.current_window(), 3);
    }
}
