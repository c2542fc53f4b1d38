//! Time utilities for the sender
//!
//! Provides the monotonic millisecond clock used for message timestamps and
//! RTT measurement, and the pacer that enforces inter-send gaps.

use std::ops::{Add, Sub};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic timestamp
///
/// Wraps std::time::Instant and converts to the millisecond values carried in
/// message headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(Instant);

impl Timestamp {
    /// Get the current timestamp
    #[inline]
    pub fn now() -> Self {
        Timestamp(Instant::now())
    }

    /// Get the underlying instant
    #[inline]
    pub fn as_instant(&self) -> Instant {
        self.0
    }

    /// Calculate duration since another timestamp
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        self.0.duration_since(earlier.0)
    }

    /// Calculate elapsed time since this timestamp
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    /// Milliseconds elapsed since the reference timestamp
    pub fn as_millis_since(&self, reference: Timestamp) -> u64 {
        self.0
            .duration_since(reference.0)
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, duration: Duration) -> Timestamp {
        Timestamp(self.0 + duration)
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, other: Timestamp) -> Duration {
        self.0.duration_since(other.0)
    }
}

static EPOCH: OnceLock<Timestamp> = OnceLock::new();

/// Process-wide reference point for [`timestamp_ms`]
pub fn process_epoch() -> Timestamp {
    *EPOCH.get_or_init(Timestamp::now)
}

/// Milliseconds since the process epoch (sender clock)
pub fn timestamp_ms() -> u64 {
    Timestamp::now().as_millis_since(process_epoch())
}

/// Sender-clock milliseconds of an instant `age` before now.
///
/// Used to place kernel receive timestamps on the process clock.
pub fn timestamp_ms_ago(age: Duration) -> u64 {
    Instant::now()
        .checked_sub(age)
        .map_or(0, |at| Timestamp(at).as_millis_since(process_epoch()))
}

/// Blocks the caller to space out sends.
///
/// The whole reactor stalls while pacing, so callers must keep delays small.
#[derive(Debug, Default)]
pub struct Pacer {
    pauses: u64,
    total_paused: Duration,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay`, returning how long the thread actually slept
    pub fn pause(&mut self, delay: Duration) -> Duration {
        if delay.is_zero() {
            return Duration::ZERO;
        }

        let start = Timestamp::now();
        thread::sleep(delay);
        let slept = start.elapsed();

        self.pauses += 1;
        self.total_paused += slept;
        slept
    }

    /// Number of non-zero pauses taken
    pub fn pauses(&self) -> u64 {
        self.pauses
    }

    /// Total time spent pausing
    pub fn total_paused(&self) -> Duration {
        self.total_paused
    }
}
