//! Datagrump - congestion-controlled datagram sender
//!
//! High-level API: pick a [`Strategy`], connect a [`UdpTransport`], and run a
//! [`Sender`] until the connection ends.

pub mod observer;
pub mod sender;

pub use datagrump_io as io;
pub use datagrump_protocol as protocol;

// Re-export commonly used types
pub use io::{Transport, UdpTransport};
pub use observer::{NullObserver, ObservedEvent, RecordingObserver, SenderObserver, TracingObserver};
pub use protocol::{CongestionController, Strategy, StrategyConfig, StrategyKind};
pub use sender::{Sender, SenderError, SenderSummary};
