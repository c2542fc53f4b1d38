//! Datagrump I/O and Platform Abstraction
//!
//! This crate provides the collaborators the sender core runs on: a
//! connected UDP transport with arrival timestamps, the millisecond clock and
//! pacer, and the single-threaded readiness poller.

pub mod poller;
pub mod socket;
pub mod time;

pub use poller::{Direction, EventSource, PollResult, Poller, PollerStats, ResultType};
pub use socket::{ReceivedDatagram, SocketError, Transport, UdpTransport};
pub use time::{timestamp_ms, timestamp_ms_ago, Pacer, Timestamp};
