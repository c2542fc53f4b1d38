//! Connected UDP transport
//!
//! Wraps a UDP socket that has been connected to a single peer. Every
//! received datagram carries its arrival time on the sender clock. Where the
//! kernel supports `SO_TIMESTAMP` the arrival time is the kernel's receive
//! stamp; elsewhere the datagram is stamped as soon as `recv` returns.

use crate::time::{timestamp_ms, timestamp_ms_ago};
use bytes::Bytes;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::cell::RefCell;
use std::io::{self, ErrorKind};
use std::mem::MaybeUninit;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Largest datagram the transport will accept
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Shortest read timeout worth arming; socket timeouts have microsecond
/// resolution and a zero timeval blocks forever.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Could not resolve {host}:{port}")]
    Unresolvable { host: String, port: u16 },
}

/// A datagram together with its arrival time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedDatagram {
    pub payload: Bytes,
    /// Arrival time (sender clock, ms)
    pub timestamp: u64,
}

/// Datagram transport towards a single peer
pub trait Transport {
    /// Send one datagram
    fn send(&self, buf: &[u8]) -> Result<usize, SocketError>;

    /// Receive one datagram, stamped on arrival
    fn receive(&self) -> Result<ReceivedDatagram, SocketError>;

    /// Wait up to `timeout` for a datagram to become readable
    fn wait_readable(&self, timeout: Duration) -> Result<bool, SocketError>;

    /// Address of the connected peer
    fn peer_address(&self) -> Result<SocketAddr, SocketError>;
}

/// Outcome of one readiness peek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Ready,
    Empty,
    /// The peer answered an earlier send with ICMP port unreachable
    Refused,
}

/// UDP socket connected to one peer
pub struct UdpTransport {
    inner: Socket,
    recv_buf: RefCell<Vec<u8>>,
    kernel_timestamps: bool,
}

impl UdpTransport {
    /// Resolve `host:port` and connect a fresh socket to it
    pub fn connect(host: &str, port: u16) -> Result<Self, SocketError> {
        let peer = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| SocketError::Unresolvable {
                host: host.to_string(),
                port,
            })?;
        Self::connect_addr(peer)
    }

    /// Connect a fresh socket to `peer`
    pub fn connect_addr(peer: SocketAddr) -> Result<Self, SocketError> {
        let domain = if peer.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        let kernel_timestamps = match enable_kernel_timestamps(&socket) {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::warn!("kernel receive timestamps unavailable: {}", e);
                false
            }
        };

        // Connecting only tags the socket with the remote address
        socket.connect(&SockAddr::from(peer))?;

        Ok(UdpTransport {
            inner: socket,
            recv_buf: RefCell::new(vec![0u8; MAX_DATAGRAM_SIZE]),
            kernel_timestamps,
        })
    }

    /// Set the receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        self.inner.set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Whether arrival times come from the kernel
    pub fn has_kernel_timestamps(&self) -> bool {
        self.kernel_timestamps
    }

    fn peek(&self) -> Result<Readiness, SocketError> {
        let mut scratch = [MaybeUninit::<u8>::uninit(); 1];
        match self.inner.peek(&mut scratch) {
            Ok(_) => Ok(Readiness::Ready),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(Readiness::Empty)
            }
            // ICMP port unreachable from an earlier send surfaces here
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                tracing::warn!("peer unreachable: {}", e);
                Ok(Readiness::Refused)
            }
            Err(e) => Err(SocketError::Io(e)),
        }
    }

    /// Receive into `buf`, returning the length and how long ago the kernel
    /// took the datagram in, when it says so.
    #[cfg(target_os = "linux")]
    fn recv_stamped(&self, buf: &mut [u8]) -> io::Result<(usize, Option<Duration>)> {
        use socket2::{MaybeUninitSlice, MsgHdrMut};

        // socket2 recvmsg needs MaybeUninit; the buffer is already initialised
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };
        let mut bufs = [MaybeUninitSlice::new(uninit_buf)];
        let mut control = [MaybeUninit::<u8>::uninit(); 64];

        let (n, control_len) = {
            let mut msg = MsgHdrMut::new()
                .with_buffers(&mut bufs)
                .with_control(&mut control);
            let n = self.inner.recvmsg(&mut msg, 0)?;
            (n, msg.control_len())
        };

        if !self.kernel_timestamps {
            return Ok((n, None));
        }
        Ok((n, kernel::receive_age(&control[..control_len])))
    }

    #[cfg(not(target_os = "linux"))]
    fn recv_stamped(&self, buf: &mut [u8]) -> io::Result<(usize, Option<Duration>)> {
        // socket2 recv needs MaybeUninit; the buffer is already initialised
        let uninit_buf = unsafe {
            std::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut MaybeUninit<u8>, buf.len())
        };
        let n = self.inner.recv(uninit_buf)?;
        Ok((n, None))
    }
}

impl Transport for UdpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize, SocketError> {
        Ok(self.inner.send(buf)?)
    }

    fn receive(&self) -> Result<ReceivedDatagram, SocketError> {
        let mut buf = self.recv_buf.borrow_mut();
        let (n, age) = self.recv_stamped(&mut buf)?;
        let timestamp = match age {
            Some(age) => timestamp_ms_ago(age),
            None => timestamp_ms(),
        };

        Ok(ReceivedDatagram {
            payload: Bytes::copy_from_slice(&buf[..n]),
            timestamp,
        })
    }

    fn wait_readable(&self, timeout: Duration) -> Result<bool, SocketError> {
        if timeout.is_zero() {
            self.inner.set_nonblocking(true)?;
            let ready = self.peek();
            self.inner.set_nonblocking(false)?;
            return Ok(ready? == Readiness::Ready);
        }

        // A refusal ends the peek early but not the wait
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining < MIN_WAIT {
                return Ok(false);
            }

            self.inner.set_read_timeout(Some(remaining))?;
            if self.peek()? == Readiness::Ready {
                return Ok(true);
            }
        }
    }

    fn peer_address(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .peer_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }
}

#[cfg(target_os = "linux")]
fn enable_kernel_timestamps(socket: &Socket) -> io::Result<bool> {
    use std::os::fd::AsRawFd;

    let on: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_TIMESTAMP,
            &on as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(true)
}

#[cfg(not(target_os = "linux"))]
fn enable_kernel_timestamps(_socket: &Socket) -> io::Result<bool> {
    Ok(false)
}

#[cfg(target_os = "linux")]
mod kernel {
    use std::mem::MaybeUninit;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    /// Age of the `SCM_TIMESTAMP` stamp in a received control buffer
    pub(super) fn receive_age(control: &[MaybeUninit<u8>]) -> Option<Duration> {
        let mut header: libc::msghdr = unsafe { std::mem::zeroed() };
        header.msg_control = control.as_ptr() as *mut libc::c_void;
        header.msg_controllen = control.len() as _;

        let mut cmsg = unsafe { libc::CMSG_FIRSTHDR(&header) };
        while !cmsg.is_null() {
            let (level, kind) = unsafe { ((*cmsg).cmsg_level, (*cmsg).cmsg_type) };
            if level == libc::SOL_SOCKET && kind == libc::SCM_TIMESTAMP {
                let tv = unsafe {
                    std::ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const libc::timeval)
                };
                let stamped =
                    UNIX_EPOCH + Duration::new(tv.tv_sec as u64, tv.tv_usec as u32 * 1000);
                // A wall clock stepped backwards reads as "just now"
                return Some(
                    SystemTime::now()
                        .duration_since(stamped)
                        .unwrap_or(Duration::ZERO),
                );
            }
            cmsg = unsafe { libc::CMSG_NXTHDR(&header, cmsg) };
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::thread;

    fn peer() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").unwrap()
    }

    /// An address nothing listens on
    fn closed_port() -> SocketAddr {
        let socket = peer();
        socket.local_addr().unwrap()
    }

    #[test]
    fn test_connect_reports_peer() {
        let remote = peer();
        let addr = remote.local_addr().unwrap();
        let transport = UdpTransport::connect_addr(addr).unwrap();

        assert_eq!(transport.peer_address().unwrap(), addr);
        assert!(transport.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn test_connect_by_host_name() {
        let remote = peer();
        let port = remote.local_addr().unwrap().port();
        let transport = UdpTransport::connect("localhost", port).unwrap();
        assert_eq!(transport.peer_address().unwrap().port(), port);
    }

    #[test]
    fn test_send_receive() {
        let remote = peer();
        let transport = UdpTransport::connect_addr(remote.local_addr().unwrap()).unwrap();

        transport.send(b"Hello, receiver!").unwrap();
        let mut buf = [0u8; 64];
        let (n, from) = remote.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"Hello, receiver!");

        let before = timestamp_ms();
        remote.send_to(b"ack", from).unwrap();
        assert!(transport.wait_readable(Duration::from_secs(1)).unwrap());

        let datagram = transport.receive().unwrap();
        assert_eq!(&datagram.payload[..], b"ack");
        assert!(datagram.timestamp + 1 >= before);
        assert!(datagram.timestamp <= timestamp_ms());

        // The buffer is reused; a shorter datagram is not padded by the last
        remote.send_to(b"x", from).unwrap();
        assert!(transport.wait_readable(Duration::from_secs(1)).unwrap());
        assert_eq!(&transport.receive().unwrap().payload[..], b"x");
    }

    #[test]
    fn test_wait_readable_times_out() {
        let remote = peer();
        let transport = UdpTransport::connect_addr(remote.local_addr().unwrap()).unwrap();

        assert!(!transport.wait_readable(Duration::ZERO).unwrap());
        assert!(!transport.wait_readable(Duration::from_millis(20)).unwrap());
    }

    #[test]
    fn test_refused_peer_waits_out_timeout() {
        let transport = UdpTransport::connect_addr(closed_port()).unwrap();

        for round in 0..3 {
            let _ = transport.send(b"anyone there?");
            // Give the ICMP error time to come back before waiting
            thread::sleep(Duration::from_millis(5));

            let start = Instant::now();
            assert!(!transport.wait_readable(Duration::from_millis(100)).unwrap());
            assert!(
                start.elapsed() >= Duration::from_millis(95),
                "round {round} returned after {:?}",
                start.elapsed()
            );
        }
    }

    #[test]
    fn test_refused_peer_zero_wait() {
        let transport = UdpTransport::connect_addr(closed_port()).unwrap();
        let _ = transport.send(b"anyone there?");
        thread::sleep(Duration::from_millis(5));
        assert!(!transport.wait_readable(Duration::ZERO).unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_receive_timestamp_is_arrival_time() {
        let remote = peer();
        let transport = UdpTransport::connect_addr(remote.local_addr().unwrap()).unwrap();
        assert!(transport.has_kernel_timestamps());

        transport.send(b"hello").unwrap();
        let mut buf = [0u8; 16];
        let (_, from) = remote.recv_from(&mut buf).unwrap();

        remote.send_to(b"ack", from).unwrap();
        let arrived_by = timestamp_ms();
        assert!(transport.wait_readable(Duration::from_secs(1)).unwrap());

        // Work done before reading must not count as network delay
        thread::sleep(Duration::from_millis(60));
        let datagram = transport.receive().unwrap();

        assert!(
            datagram.timestamp <= arrived_by + 20,
            "stamped {} for a datagram in by {}",
            datagram.timestamp,
            arrived_by
        );
    }
}
