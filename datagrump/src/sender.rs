//! Datagram sender
//!
//! Drives one congestion-control strategy over a transport. Two reactor
//! rules do all the work: while the window is open, send datagrams until it
//! closes; when an acknowledgement arrives, fold it into the strategy. If
//! neither fires within the strategy's retransmission timeout, exactly one
//! datagram goes out tagged as a timeout send.

use crate::observer::{NullObserver, SenderObserver};
use datagrump_io::{
    timestamp_ms, Direction, EventSource, Pacer, PollResult, Poller, ReceivedDatagram,
    ResultType, SocketError, Transport,
};
use datagrump_protocol::message::{check_payload_size, DEFAULT_PAYLOAD_SIZE};
use datagrump_protocol::{
    AckEvent, CongestionController, Message, MessageError, MessageKind, SendEvent, Strategy,
};
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Sender errors
#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Malformed message: {0}")]
    Message(#[from] MessageError),

    #[error("Protocol violation: sender got a {0} message instead of an ack")]
    ProtocolViolation(MessageKind),
}

/// Counters kept over the lifetime of a sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderSummary {
    pub datagrams_sent: u64,
    pub timeouts: u64,
    pub acks_received: u64,
}

/// Per-connection accounting; the reactor's event source
struct Session<T, C> {
    transport: T,
    controller: C,
    observer: Box<dyn SenderObserver>,
    pacer: Pacer,
    /// Next outgoing sequence number
    sequence_number: u64,
    /// Next sequence number expected to be acknowledged, absent reordering
    next_ack_expected: u64,
    payload_size: usize,
    summary: SenderSummary,
}

impl<T: Transport, C: CongestionController> Session<T, C> {
    fn outstanding(&self) -> u64 {
        self.sequence_number.saturating_sub(self.next_ack_expected)
    }

    fn window_is_open(&self) -> bool {
        self.outstanding() < self.controller.current_window() as u64
    }

    fn send_datagram(&mut self, after_timeout: bool) -> Result<(), SenderError> {
        let delay = self.controller.pacing_delay(timestamp_ms());
        if !delay.is_zero() {
            let slept = self.pacer.pause(delay);
            self.observer.on_paced(delay, slept);
        }

        let message = Message::data(self.sequence_number, timestamp_ms(), self.payload_size);
        match self.transport.send(&message.to_bytes()) {
            Ok(_) => {}
            // The datagram is lost, which is the network's business
            Err(SocketError::Io(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                tracing::warn!("send to unreachable peer: {}", e);
            }
            Err(e) => return Err(e.into()),
        }

        let event = SendEvent {
            sequence_number: message.header.sequence_number,
            send_timestamp: message.header.send_timestamp,
            after_timeout,
        };
        self.controller.on_datagram_sent(&event);
        self.observer
            .on_datagram_sent(&event, &self.controller.stats());

        self.sequence_number += 1;
        self.summary.datagrams_sent += 1;
        Ok(())
    }

    fn got_ack(&mut self, datagram: ReceivedDatagram) -> Result<(), SenderError> {
        let ack = Message::from_bytes(&datagram.payload)?;
        if !ack.is_ack() {
            return Err(SenderError::ProtocolViolation(ack.kind()));
        }

        self.next_ack_expected = self
            .next_ack_expected
            .max(ack.header.ack_sequence_number.saturating_add(1));

        let event = AckEvent {
            acked_sequence_number: ack.header.ack_sequence_number,
            send_timestamp_acked: ack.header.ack_send_timestamp,
            recv_timestamp_acked: ack.header.ack_recv_timestamp,
            ack_received_timestamp: datagram.timestamp,
        };
        self.controller.on_ack_received(&event);
        self.observer
            .on_ack_received(&event, &self.controller.stats());

        self.summary.acks_received += 1;
        Ok(())
    }
}

impl<T: Transport, C: CongestionController> EventSource for Session<T, C> {
    type Error = SenderError;

    fn interested(&self, direction: Direction) -> bool {
        match direction {
            Direction::Out => self.window_is_open(),
            Direction::In => true,
        }
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, SenderError> {
        Ok(self.transport.wait_readable(timeout)?)
    }

    fn on_ready(&mut self, direction: Direction) -> Result<ResultType, SenderError> {
        match direction {
            Direction::Out => {
                while self.window_is_open() {
                    self.send_datagram(false)?;
                }
            }
            Direction::In => {
                let datagram = self.transport.receive()?;
                self.got_ack(datagram)?;
            }
        }
        Ok(ResultType::Continue)
    }
}

/// Sender bound to one peer and one strategy
pub struct Sender<T, C = Strategy> {
    session: Session<T, C>,
    poller: Poller,
}

impl<T: Transport, C: CongestionController> Sender<T, C> {
    pub fn new(transport: T, controller: C) -> Self {
        Sender {
            session: Session {
                transport,
                controller,
                observer: Box::new(NullObserver),
                pacer: Pacer::new(),
                sequence_number: 0,
                next_ack_expected: 0,
                payload_size: DEFAULT_PAYLOAD_SIZE,
                summary: SenderSummary::default(),
            },
            poller: Poller::new(),
        }
    }

    /// Attach a diagnostic observer
    pub fn with_observer(mut self, observer: Box<dyn SenderObserver>) -> Self {
        self.session.observer = observer;
        self
    }

    /// Set the filler payload length of data datagrams
    pub fn with_payload_size(mut self, size: usize) -> Result<Self, SenderError> {
        self.session.payload_size = check_payload_size(size)?;
        Ok(self)
    }

    pub fn controller(&self) -> &C {
        &self.session.controller
    }

    pub fn transport(&self) -> &T {
        &self.session.transport
    }

    pub fn summary(&self) -> SenderSummary {
        self.session.summary
    }

    pub fn pacer(&self) -> &Pacer {
        &self.session.pacer
    }

    /// Datagrams sent but not yet acknowledged
    pub fn outstanding(&self) -> u64 {
        self.session.outstanding()
    }

    pub fn window_is_open(&self) -> bool {
        self.session.window_is_open()
    }

    /// Run one reactor round; on timeout, send one datagram to get things
    /// moving again.
    pub fn step(&mut self) -> Result<PollResult, SenderError> {
        let timeout = self.session.controller.retransmission_timeout();
        let result = self.poller.poll(&mut self.session, timeout)?;

        if result == PollResult::Timeout {
            self.session.summary.timeouts += 1;
            self.session.observer.on_timeout(timeout);
            self.session.send_datagram(true)?;
        }
        Ok(result)
    }

    /// Run until a rule requests exit or an error aborts the connection
    pub fn run(&mut self) -> Result<i32, SenderError> {
        loop {
            if let PollResult::Exit(status) = self.step()? {
                return Ok(status);
            }
        }
    }
}
