//! The transport contract consumed by [`Connection`](crate::Connection).
//!
//! A transport adapter wraps one OS-level byte stream (a Unix domain socket,
//! a named pipe, or a scripted test double).  It must provide:
//!
//! - [`Transport::connect_to`] – start connecting; completion is reported
//!   later as [`TransportEventKind::Connected`] or
//!   [`TransportEventKind::Error`].
//! - [`Transport::write`] – accept as many bytes as possible *right now*
//!   without blocking, returning the count.  Accepted bytes are later
//!   confirmed with [`TransportEventKind::BytesWritten`].
//! - [`Transport::read_available`] – drain whatever inbound bytes are ready.
//!
//! Events are not delivered through callbacks.  The adapter posts
//! [`TransportEvent`]s to whatever queue the run loop reads from, and the run
//! loop feeds them to [`Connection::handle_event`](crate::Connection::handle_event)
//! one at a time.  Dropping a transport must release the underlying stream
//! and stop any background work that posts events for it.

pub mod generation;

use std::fmt;
use std::io;

use thiserror::Error;

pub use generation::Generation;

/// Hard failure returned by [`Transport::write`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handle has no connected stream to write to.
    #[error("transport is not connected")]
    NotConnected,

    /// The OS rejected the write.
    #[error("transport write failed: {0}")]
    Io(#[from] io::Error),
}

/// Coarse reason attached to a [`TransportEventKind::Error`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorCode {
    /// Nothing is listening on the endpoint.
    ConnectionRefused,
    /// The endpoint does not exist.
    ServerNotFound,
    /// The remote side closed the stream unexpectedly.
    PeerClosed,
    /// Permission denied on the endpoint.
    AccessDenied,
    /// Out of descriptors, buffers or similar.
    ResourceExhausted,
    /// The operation timed out at the OS level.
    TimedOut,
    /// Anything else.
    Other,
}

impl TransportErrorCode {
    /// Maps an I/O error kind to the closest code.
    pub fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::NotFound => Self::ServerNotFound,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::PeerClosed,
            io::ErrorKind::PermissionDenied => Self::AccessDenied,
            io::ErrorKind::OutOfMemory => Self::ResourceExhausted,
            io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ConnectionRefused => "connection refused",
            Self::ServerNotFound => "server not found",
            Self::PeerClosed => "peer closed",
            Self::AccessDenied => "access denied",
            Self::ResourceExhausted => "resource exhausted",
            Self::TimedOut => "timed out",
            Self::Other => "transport error",
        };
        f.write_str(text)
    }
}

/// What happened on a transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The connection attempt completed.
    Connected,
    /// The stream closed.
    Disconnected,
    /// The stream failed.
    Error(TransportErrorCode),
    /// Inbound bytes are ready for [`Transport::read_available`].
    Readable,
    /// `n` previously accepted bytes were written out.  `n` may be 0 when the
    /// adapter only wants to signal that the stream is writable again.
    BytesWritten(usize),
}

/// An event tagged with the generation of the handle that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportEvent {
    pub generation: Generation,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(generation: Generation, kind: TransportEventKind) -> Self {
        Self { generation, kind }
    }
}

/// One byte-stream handle.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Begins connecting to `endpoint`.
    fn connect_to(&mut self, endpoint: &str);

    /// Hands `bytes` to the stream, returning how many leading bytes were
    /// accepted (possibly 0).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the stream can no longer be written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Drains all inbound bytes that are ready right now.
    fn read_available(&mut self) -> Vec<u8>;
}

/// Opens fresh transport handles for [`Connection::connect`](crate::Connection::connect).
pub trait TransportFactory {
    type Transport: Transport;

    /// Creates a handle whose events will be tagged with `generation`.
    fn open(&mut self, generation: Generation) -> Self::Transport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_maps_common_io_kinds() {
        assert_eq!(
            TransportErrorCode::from_io_kind(io::ErrorKind::ConnectionRefused),
            TransportErrorCode::ConnectionRefused
        );
        assert_eq!(
            TransportErrorCode::from_io_kind(io::ErrorKind::NotFound),
            TransportErrorCode::ServerNotFound
        );
        assert_eq!(
            TransportErrorCode::from_io_kind(io::ErrorKind::BrokenPipe),
            TransportErrorCode::PeerClosed
        );
        assert_eq!(
            TransportErrorCode::from_io_kind(io::ErrorKind::InvalidData),
            TransportErrorCode::Other
        );
    }

    #[test]
    fn test_event_carries_generation() {
        let event = TransportEvent::new(Generation::new(3), TransportEventKind::Readable);
        assert_eq!(event.generation.value(), 3);
        assert_eq!(event.kind, TransportEventKind::Readable);
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::NotConnected.to_string(), "transport is not connected");
    }
}
