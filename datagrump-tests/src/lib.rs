//! Test harness shared by the integration tests
//!
//! [`LoopbackReceiver`] plays the receiving end of a transfer on
//! `127.0.0.1`: it acknowledges every data datagram it gets, or misbehaves
//! on request so tests can watch the sender react.

use crossbeam::channel::{self, Receiver, Sender};
use datagrump_io::{timestamp_ms, UdpTransport};
use datagrump_protocol::Message;
use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How the receiver answers data datagrams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Acknowledge each datagram
    Ack,
    /// Send the data datagram straight back
    Echo,
    /// Acknowledge only every `n`th datagram
    AckEvery(u64),
}

/// Counters reported when the receiver stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverReport {
    pub datagrams_received: u64,
    pub replies_sent: u64,
    pub highest_sequence_number: Option<u64>,
}

/// Receiver thread bound to an ephemeral loopback port
pub struct LoopbackReceiver {
    addr: SocketAddr,
    stop: Sender<()>,
    handle: JoinHandle<ReceiverReport>,
    arrivals: Receiver<u64>,
}

impl LoopbackReceiver {
    pub fn spawn(mode: ReplyMode) -> Self {
        Self::spawn_with_delay(mode, Duration::ZERO)
    }

    /// Spawn a receiver that holds each reply back by `delay`
    pub fn spawn_with_delay(mode: ReplyMode, delay: Duration) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let (stop, stop_rx) = channel::bounded(1);
        let (arrival_tx, arrivals) = channel::unbounded();

        let handle = thread::spawn(move || {
            let mut report = ReceiverReport::default();
            let mut buf = [0u8; 2048];

            while stop_rx.try_recv().is_err() {
                let (n, from) = match socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(_) => continue,
                };
                let recv_timestamp = timestamp_ms();
                let Ok(message) = Message::from_bytes(&buf[..n]) else {
                    continue;
                };

                let seq = message.header.sequence_number;
                report.datagrams_received += 1;
                report.highest_sequence_number =
                    Some(report.highest_sequence_number.map_or(seq, |h| h.max(seq)));
                let _ = arrival_tx.send(seq);

                let reply = match mode {
                    ReplyMode::Ack => Some(message.into_ack(report.replies_sent, recv_timestamp)),
                    ReplyMode::AckEvery(n) if n > 0 && seq % n == n - 1 => {
                        Some(message.into_ack(report.replies_sent, recv_timestamp))
                    }
                    ReplyMode::AckEvery(_) => None,
                    ReplyMode::Echo => Some(message),
                };

                if let Some(reply) = reply {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    if socket.send_to(&reply.to_bytes(), from).is_ok() {
                        report.replies_sent += 1;
                    }
                }
            }

            report
        });

        LoopbackReceiver {
            addr,
            stop,
            handle,
            arrivals,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A transport connected to this receiver
    pub fn connect(&self) -> UdpTransport {
        UdpTransport::connect_addr(self.addr).unwrap()
    }

    /// Wait up to `timeout` for the next data datagram to arrive
    pub fn next_arrival(&self, timeout: Duration) -> Option<u64> {
        self.arrivals.recv_timeout(timeout).ok()
    }

    /// Stop the thread and collect its counters
    pub fn stop(self) -> ReceiverReport {
        let _ = self.stop.send(());
        self.handle.join().unwrap()
    }
}
