//! Diagnostic hooks
//!
//! The sender reports every send, ack, timeout and pacing pause to a
//! [`SenderObserver`]. Observers only watch: nothing they do feeds back into
//! window decisions.

use datagrump_protocol::{AckEvent, CongestionStats, SendEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub trait SenderObserver {
    fn on_datagram_sent(&mut self, _event: &SendEvent, _stats: &CongestionStats) {}

    fn on_ack_received(&mut self, _event: &AckEvent, _stats: &CongestionStats) {}

    fn on_timeout(&mut self, _timeout: Duration) {}

    fn on_paced(&mut self, _requested: Duration, _slept: Duration) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SenderObserver for NullObserver {}

/// Writes one `debug!` line per event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SenderObserver for TracingObserver {
    fn on_datagram_sent(&mut self, event: &SendEvent, stats: &CongestionStats) {
        tracing::debug!(
            "At time {} sent datagram {} (timeout = {}), window is {:.2}",
            event.send_timestamp,
            event.sequence_number,
            event.after_timeout,
            stats.window
        );
    }

    fn on_ack_received(&mut self, event: &AckEvent, stats: &CongestionStats) {
        tracing::debug!(
            "At time {} received ack for datagram {} (send @ time {}, received @ time {} by receiver's clock), rtt {} ms, window is {:.2}",
            event.ack_received_timestamp,
            event.acked_sequence_number,
            event.send_timestamp_acked,
            event.recv_timestamp_acked,
            event.current_rtt(),
            stats.window
        );
    }

    fn on_timeout(&mut self, timeout: Duration) {
        tracing::debug!("No events for {:?}, sending after timeout", timeout);
    }

    fn on_paced(&mut self, requested: Duration, slept: Duration) {
        tracing::trace!(?requested, ?slept, "paced");
    }
}

/// An event seen by [`RecordingObserver`]
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Sent { event: SendEvent, window: f64 },
    Acked { event: AckEvent, window: f64 },
    Timeout(Duration),
    Paced(Duration),
}

/// Collects events into a shared log
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<ObservedEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    /// Windows reported alongside each send and ack, in order
    pub fn windows(&self) -> Vec<f64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Sent { window, .. } | ObservedEvent::Acked { window, .. } => {
                    Some(*window)
                }
                _ => None,
            })
            .collect()
    }
}

impl SenderObserver for RecordingObserver {
    fn on_datagram_sent(&mut self, event: &SendEvent, stats: &CongestionStats) {
        self.events.lock().push(ObservedEvent::Sent {
            event: *event,
            window: stats.window,
        });
    }

    fn on_ack_received(&mut self, event: &AckEvent, stats: &CongestionStats) {
        self.events.lock().push(ObservedEvent::Acked {
            event: *event,
            window: stats.window,
        });
    }

    fn on_timeout(&mut self, timeout: Duration) {
        self.events.lock().push(ObservedEvent::Timeout(timeout));
    }

    fn on_paced(&mut self, _requested: Duration, slept: Duration) {
        self.events.lock().push(ObservedEvent::Paced(slept));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagrump_protocol::{CongestionController, Strategy, StrategyKind};

    #[test]
    fn test_recording_observer_shares_log() {
        let recorder = RecordingObserver::new();
        let mut handle = recorder.clone();
        let stats = Strategy::with_defaults(StrategyKind::Fixed).stats();

        handle.on_datagram_sent(
            &SendEvent {
                sequence_number: 0,
                send_timestamp: 5,
                after_timeout: false,
            },
            &stats,
        );
        handle.on_timeout(Duration::from_millis(250));

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ObservedEvent::Timeout(Duration::from_millis(250)));
        assert_eq!(recorder.windows(), vec![10.0]);
    }
}
