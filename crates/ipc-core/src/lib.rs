//! # ipc-core
//!
//! Shared library for the local IPC channel: the wire framing, the outbound
//! write queue, the inbound read assembler and the [`Connection`] state
//! machine that ties them to a byte-stream transport.
//!
//! This crate opens no OS sockets and never spawns or awaits anything.  The
//! only piece of tokio it touches is the `sync::mpsc` sender that carries
//! [`ConnectionEvent`]s to the owner, which works outside a runtime.  The
//! transport and the command type system are reached through traits
//! ([`Transport`], [`TransportFactory`], [`Command`], [`CommandDecoder`]) so
//! the whole state machine can be driven from tests with scripted events.
//!
//! # Architecture overview (for beginners)
//!
//! Two processes on the same host (for example a front-end and a background
//! service) talk over a local socket.  A socket is a *byte stream*: the
//! operating system hands bytes over in whatever chunk sizes it likes, so a
//! single read may contain half a message or three messages glued together.
//!
//! - **`protocol`** – How commands are turned into bytes and back.  Every
//!   command travels as one *frame*:
//!   `[payload_len:u32][id_len:u32][id][payload]`.
//!
//! - **`transport`** – The contract a socket adapter must fulfil: connect,
//!   write "as many bytes as you can right now", read whatever is available,
//!   and report events tagged with a [`Generation`].
//!
//! - **`connection`** – The [`Connection`] object.  It queues outbound frames
//!   against partial writes, reassembles inbound frames from arbitrary chunks,
//!   and reports state changes and received commands to its owner.
//!
//! - **`config`** – Tunables such as the endpoint name and the maximum
//!   accepted frame size.

pub mod config;
pub mod connection;
pub mod protocol;
pub mod transport;

// Re-export the most-used types at the crate root so callers can write
// `ipc_core::Connection` instead of `ipc_core::connection::Connection`.
pub use config::{ConnectionConfig, DEFAULT_MAX_FRAME_SIZE};
pub use connection::{Connection, ConnectionEvent, ConnectionId, ConnectionState};
pub use protocol::{
    can_extract, encode_command, encode_frame, extract, Command, CommandDecoder, CommandRegistry,
    DecodeError, ProtocolError, RawCommand, RawDecoder, RawFrame, FRAME_HEADER_SIZE,
};
pub use transport::{
    Generation, Transport, TransportError, TransportErrorCode, TransportEvent, TransportEventKind,
    TransportFactory,
};
