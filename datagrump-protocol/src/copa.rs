//! Delay-gradient window policy with pacing
//!
//! Every ack compares the current sending rate, `window / rtt_standing`, with
//! a target rate derived from the queuing delay, `1 / (epsilon * dq)`. Below
//! target the window grows by `v / (epsilon * window)`, above it the window
//! shrinks by the same step (but never from at or below
//! `min_shrink_window`). The step is roughly a constant fraction of the
//! window per RTT.
//!
//! Once per epoch (a window's worth of acks) two coarser adjustments run:
//!
//! 1. While in slow start, a growing epoch doubles the window. The first
//!    ack that actually shrinks the window ends slow start for good.
//! 2. Velocity `v` doubles after `velocity_run_length` consecutive epochs
//!    moving in the same direction, and resets to 1 when direction flips.
//!    It never exceeds `max_velocity`, and the window never exceeds
//!    `max_window`.
//!
//! Sends are paced: the gap between consecutive sends is at least
//! `pacing_factor * window / rtt_standing` milliseconds.

use crate::config::{CopaConfig, StrategyKind};
use crate::congestion::{
    truncate_window, AckEvent, CongestionController, CongestionStats, SendEvent, MIN_WINDOW,
};
use crate::rtt::DelaySignals;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CopaStrategy {
    config: CopaConfig,
    signals: DelaySignals,
    /// Fractional congestion window (datagrams)
    window: f64,
    /// Step multiplier
    velocity: f64,
    /// Signed run length of same-direction epochs, 0 before the first epoch
    direction: i32,
    slow_start: bool,
    /// Window at the end of the previous epoch
    old_window: f64,
    /// Acks seen in the current epoch
    packet_count: u64,
    /// Completed epochs
    epochs: u64,
    /// Timestamp of the most recent send (sender clock, ms)
    last_sent_timestamp: u64,
}

impl CopaStrategy {
    pub fn new(config: CopaConfig) -> Self {
        let window = config.initial_window.max(MIN_WINDOW as f64);
        CopaStrategy {
            signals: DelaySignals::new(
                config.initial_srtt_ms,
                config.initial_rtt_ms,
                config.srtt_gain,
            ),
            window,
            velocity: 1.0,
            direction: 0,
            slow_start: true,
            old_window: window,
            packet_count: 0,
            epochs: 0,
            last_sent_timestamp: 0,
            config,
        }
    }

    /// Fractional window
    pub fn window(&self) -> f64 {
        self.window
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn direction(&self) -> i32 {
        self.direction
    }

    pub fn in_slow_start(&self) -> bool {
        self.slow_start
    }

    pub fn epochs(&self) -> u64 {
        self.epochs
    }

    pub fn signals(&self) -> &DelaySignals {
        &self.signals
    }

    /// Target rate in datagrams per ms; unbounded when there is no queuing
    fn target_rate(&self) -> f64 {
        let dq = self.signals.queuing_delay();
        if dq == 0 {
            return f64::INFINITY;
        }
        1.0 / (self.config.epsilon * dq as f64)
    }

    /// Current rate in datagrams per ms
    fn current_rate(&self) -> f64 {
        let standing = self.signals.rtt_standing();
        if standing == 0 {
            return f64::INFINITY;
        }
        self.window / standing as f64
    }

    /// Double velocity, saturating at `max_velocity`
    fn double_velocity(&mut self) {
        self.velocity = (self.velocity * 2.0).min(self.config.max_velocity);
    }

    fn clamp_window(&self, window: f64) -> f64 {
        window.min(self.config.max_window).max(MIN_WINDOW as f64)
    }

    fn end_epoch(&mut self, grew: bool) {
        if self.slow_start && grew {
            self.window = self.clamp_window(self.window * 2.0);
        }

        let run = self.config.velocity_run_length;
        if self.window > self.old_window {
            if self.direction > 0 {
                if self.direction >= run {
                    self.double_velocity();
                }
                self.direction = self.direction.saturating_add(1);
            } else {
                self.velocity = 1.0;
                self.direction = 1;
            }
        } else if self.direction < 0 {
            if self.direction <= -run {
                self.double_velocity();
            }
            self.direction = self.direction.saturating_sub(1);
        } else {
            self.velocity = 1.0;
            self.direction = -1;
        }

        tracing::trace!(
            window = self.window,
            velocity = self.velocity,
            direction = self.direction,
            slow_start = self.slow_start,
            "copa epoch"
        );

        self.old_window = self.window;
        self.packet_count = 0;
        self.epochs += 1;
    }
}

impl Default for CopaStrategy {
    fn default() -> Self {
        Self::new(CopaConfig::default())
    }
}

impl CongestionController for CopaStrategy {
    fn current_window(&self) -> u32 {
        truncate_window(self.window)
    }

    fn on_datagram_sent(&mut self, event: &SendEvent) {
        self.last_sent_timestamp = event.send_timestamp;
    }

    fn on_ack_received(&mut self, event: &AckEvent) {
        self.signals
            .update(event.ack_received_timestamp, event.current_rtt());

        let step = self.velocity / (self.config.epsilon * self.window);
        let grew = self.current_rate() <= self.target_rate();
        if grew {
            self.window += step;
        } else {
            if self.window > self.config.min_shrink_window {
                self.window -= step;
                self.slow_start = false;
            }
        }
        self.window = self.clamp_window(self.window);

        // Fractional windows are compared untruncated: a window of 10.5
        // closes its epoch on the 11th ack.
        self.packet_count += 1;
        if self.packet_count as f64 >= self.window {
            self.end_epoch(grew);
        }
    }

    fn retransmission_timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn pacing_delay(&self, now_ms: u64) -> Duration {
        let standing = self.signals.rtt_standing();
        if standing == 0 {
            return Duration::ZERO;
        }

        let pace = self.config.pacing_factor * self.window / standing as f64;
        let elapsed = now_ms.saturating_sub(self.last_sent_timestamp) as f64;
        let deficit = pace - elapsed;
        if deficit > 0.0 && deficit < self.config.max_pacing_delay_ms {
            Duration::from_secs_f64(deficit / 1000.0)
        } else {
            Duration::ZERO
        }
    }

    fn stats(&self) -> CongestionStats {
        CongestionStats {
            rtt_ms: Some(self.signals.srtt()),
            rtt_min_ms: Some(self.signals.rtt_min()),
            slow_start: self.slow_start,
            ..CongestionStats::basic(StrategyKind::Copa, self.window, self.retransmission_timeout())
        }
    }
}
