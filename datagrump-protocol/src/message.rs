//! Contest Message Structures and Serialization
//!
//! Every datagram exchanged between sender and receiver carries the same
//! 48-byte header (six big-endian 64-bit fields) followed by filler payload.
//! Data messages and acknowledgements are distinguished by the
//! `ack_sequence_number` field: data messages carry the reserved value
//! [`NOT_AN_ACK`], acknowledgements carry the sequence number they confirm.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Size of the message header in bytes (6 fields × 8 bytes each)
pub const HEADER_SIZE: usize = 48;

/// Default filler payload length used by the sender
pub const DEFAULT_PAYLOAD_SIZE: usize = 1424;

/// Largest payload that still fits a 1500-byte MTU (minus IP/UDP and header)
pub const MAX_PAYLOAD_SIZE: usize = 1500 - 28 - HEADER_SIZE;

/// Sentinel `ack_sequence_number` carried by data messages
pub const NOT_AN_ACK: u64 = u64::MAX;

/// Byte used to fill data payloads
pub const FILLER_BYTE: u8 = b'x';

/// Message header (384 bits = 48 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Sequence number of this datagram
    pub sequence_number: u64,
    /// When this datagram was sent (sender clock, ms)
    pub send_timestamp: u64,
    /// Sequence number being acknowledged, or [`NOT_AN_ACK`]
    pub ack_sequence_number: u64,
    /// Echo of the acknowledged datagram's send timestamp (sender clock, ms)
    pub ack_send_timestamp: u64,
    /// When the acknowledged datagram arrived (receiver clock, ms)
    pub ack_recv_timestamp: u64,
    /// Payload length of the acknowledged datagram
    pub ack_payload_length: u64,
}

impl MessageHeader {
    /// Create a header for an outgoing data message
    pub fn new_data(sequence_number: u64, send_timestamp: u64) -> Self {
        MessageHeader {
            sequence_number,
            send_timestamp,
            ack_sequence_number: NOT_AN_ACK,
            ack_send_timestamp: 0,
            ack_recv_timestamp: 0,
            ack_payload_length: 0,
        }
    }

    /// Check if this header belongs to an acknowledgement
    #[inline]
    pub fn is_ack(&self) -> bool {
        self.ack_sequence_number != NOT_AN_ACK
    }

    /// Parse header from bytes (network byte order)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() < HEADER_SIZE {
            return Err(MessageError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        Ok(MessageHeader {
            sequence_number: buf.get_u64(),
            send_timestamp: buf.get_u64(),
            ack_sequence_number: buf.get_u64(),
            ack_send_timestamp: buf.get_u64(),
            ack_recv_timestamp: buf.get_u64(),
            ack_payload_length: buf.get_u64(),
        })
    }

    /// Serialize header to bytes (network byte order)
    pub fn to_bytes(&self, buf: &mut BytesMut) {
        buf.put_u64(self.sequence_number);
        buf.put_u64(self.send_timestamp);
        buf.put_u64(self.ack_sequence_number);
        buf.put_u64(self.ack_send_timestamp);
        buf.put_u64(self.ack_recv_timestamp);
        buf.put_u64(self.ack_payload_length);
    }
}

/// A datagram on the wire: header plus opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message header
    pub header: MessageHeader,
    /// Filler payload
    pub payload: Bytes,
}

impl Message {
    /// Create a data message with `payload_size` bytes of filler
    pub fn data(sequence_number: u64, send_timestamp: u64, payload_size: usize) -> Self {
        Message {
            header: MessageHeader::new_data(sequence_number, send_timestamp),
            payload: filler(payload_size),
        }
    }

    /// Check if this message is an acknowledgement
    pub fn is_ack(&self) -> bool {
        self.header.is_ack()
    }

    /// Message kind, for diagnostics
    pub fn kind(&self) -> MessageKind {
        if self.is_ack() {
            MessageKind::Ack
        } else {
            MessageKind::Data
        }
    }

    /// Turn a received data message into its acknowledgement.
    ///
    /// The acknowledgement echoes the data message's sequence number and send
    /// timestamp and records `recv_timestamp` (receiver clock). The payload is
    /// dropped; acknowledgements carry only the header.
    pub fn into_ack(self, ack_sequence_number: u64, recv_timestamp: u64) -> Self {
        Message {
            header: MessageHeader {
                sequence_number: ack_sequence_number,
                send_timestamp: 0,
                ack_sequence_number: self.header.sequence_number,
                ack_send_timestamp: self.header.send_timestamp,
                ack_recv_timestamp: recv_timestamp,
                ack_payload_length: self.payload.len() as u64,
            },
            payload: Bytes::new(),
        }
    }

    /// Total size of the message (header + payload)
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the message to bytes
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.to_bytes(&mut buf);
        buf.put_slice(&self.payload);
        buf
    }

    /// Parse a message from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let header = MessageHeader::from_bytes(bytes)?;

        let payload = if bytes.len() > HEADER_SIZE {
            Bytes::copy_from_slice(&bytes[HEADER_SIZE..])
        } else {
            Bytes::new()
        };

        Ok(Message { header, payload })
    }
}

fn filler(size: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(size);
    buf.put_bytes(FILLER_BYTE, size);
    buf.freeze()
}

/// Message type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Data,
    Ack,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Data => write!(f, "Data"),
            MessageKind::Ack => write!(f, "Ack"),
        }
    }
}

/// Message parsing errors
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Reject payload sizes that would not fit a single datagram
pub fn check_payload_size(size: usize) -> Result<usize, MessageError> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(MessageError::PayloadTooLarge {
            size,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(size)
}
