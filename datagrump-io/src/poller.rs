//! Readiness-driven event loop
//!
//! A single-threaded reactor with two rules: "outbound ready" and "inbound
//! has data". Each rule has an interest predicate; the poller only fires a
//! rule while its owner is interested. Rules never run concurrently, so
//! whatever state they touch needs no locking.

use std::thread;
use std::time::Duration;

/// Which side of the socket a rule watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// What a rule asks the poller to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Continue,
    Exit(i32),
}

/// Outcome of one [`Poller::poll`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// At least one rule fired
    Fired,
    /// Nothing happened before the timeout
    Timeout,
    /// A rule requested exit with this status
    Exit(i32),
}

/// The rules a poller drives
pub trait EventSource {
    type Error;

    /// Whether the rule for `direction` currently wants to run
    fn interested(&self, direction: Direction) -> bool;

    /// Block up to `timeout` until inbound data is available
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, Self::Error>;

    /// Run the rule for `direction`
    fn on_ready(&mut self, direction: Direction) -> Result<ResultType, Self::Error>;
}

/// Poller counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub outbound_fired: u64,
    pub inbound_fired: u64,
    pub timeouts: u64,
}

/// Datagram sockets are treated as always writable, so the outbound rule
/// fires whenever it is interested. The inbound rule then gets a
/// non-blocking look if outbound work was done, or the full timeout if not.
#[derive(Debug, Default)]
pub struct Poller {
    stats: PollerStats,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> PollerStats {
        self.stats
    }

    /// Run at most one round of rules
    pub fn poll<S: EventSource>(
        &mut self,
        source: &mut S,
        timeout: Duration,
    ) -> Result<PollResult, S::Error> {
        let mut fired = false;

        if source.interested(Direction::Out) {
            self.stats.outbound_fired += 1;
            if let ResultType::Exit(status) = source.on_ready(Direction::Out)? {
                return Ok(PollResult::Exit(status));
            }
            fired = true;
        }

        let wait = if fired { Duration::ZERO } else { timeout };
        if source.interested(Direction::In) {
            if source.wait_readable(wait)? {
                self.stats.inbound_fired += 1;
                if let ResultType::Exit(status) = source.on_ready(Direction::In)? {
                    return Ok(PollResult::Exit(status));
                }
                fired = true;
            }
        } else if !fired {
            thread::sleep(wait);
        }

        if fired {
            Ok(PollResult::Fired)
        } else {
            self.stats.timeouts += 1;
            Ok(PollResult::Timeout)
        }
    }
}
