//! The connection state machine.
//!
//! A [`Connection`] owns one transport handle at a time together with a
//! [`WriteQueue`] and a [`ReadAssembler`].  It is driven entirely from the
//! outside, on one logical thread:
//!
//! - the owner calls [`connect`](Connection::connect),
//!   [`send`](Connection::send) and [`close`](Connection::close);
//! - the run loop feeds every [`TransportEvent`] to
//!   [`handle_event`](Connection::handle_event).
//!
//! None of these calls block.  Results flow back to the owner as
//! [`ConnectionEvent`]s on an unbounded channel, so a single owner can
//! multiplex many connections on one receiver and tell them apart by
//! [`ConnectionId`].
//!
//! # Connection lifecycle
//!
//! ```text
//!                 connect()
//!  Disconnected ───────────► Connecting ──Connected──► Connected
//!       ▲                        │                         │
//!       └──────Disconnected──────┴──────Disconnected───────┘
//!
//!  any state ──Error──► Error          any state ──connect()──► Connecting
//! ```
//!
//! # Preconditions
//!
//! `send` and `close` require a live transport handle.  Calling them without
//! one is a programming error and panics; owners gate them on
//! [`has_transport`](Connection::has_transport) or on the `Connected` state.

pub mod read_assembler;
pub mod write_queue;

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::protocol::frame::{self, RawFrame};
use crate::protocol::{Command, CommandDecoder};
use crate::transport::{
    Generation, Transport, TransportEvent, TransportEventKind, TransportFactory,
};

pub use read_assembler::ReadAssembler;
pub use write_queue::{Completion, WriteQueue};

/// Identity of a connection, carried by every event it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Observable state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection.  Initial state, and the state after the peer goes away.
    Disconnected,
    /// `connect()` was issued; waiting for the transport.
    Connecting,
    /// The stream is up; commands can be sent.
    Connected,
    /// The transport failed or the peer broke the framing protocol.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(text)
    }
}

/// Notifications delivered to the connection's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent<C> {
    /// The connection entered `state`.
    StateChanged {
        state: ConnectionState,
        connection: ConnectionId,
    },
    /// A complete frame was decoded.  Ownership of `command` passes to the
    /// receiver.
    CommandReceived {
        command: C,
        connection: ConnectionId,
    },
    /// Every queued byte has been written out.
    AllWritten { connection: ConnectionId },
}

impl<C> ConnectionEvent<C> {
    /// The connection that emitted this event.
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::StateChanged { connection, .. }
            | Self::CommandReceived { connection, .. }
            | Self::AllWritten { connection } => *connection,
        }
    }
}

/// A framed, message-oriented connection over a byte-stream transport.
pub struct Connection<F, D>
where
    F: TransportFactory,
    D: CommandDecoder,
{
    id: ConnectionId,
    config: ConnectionConfig,
    factory: F,
    decoder: D,
    transport: Option<F::Transport>,
    generation: Generation,
    state: ConnectionState,
    writes: WriteQueue,
    reads: ReadAssembler,
    events: mpsc::UnboundedSender<ConnectionEvent<D::Command>>,
}

impl<F, D> Connection<F, D>
where
    F: TransportFactory,
    D: CommandDecoder,
{
    /// Creates a disconnected connection with a fresh [`ConnectionId`].
    pub fn new(
        config: ConnectionConfig,
        factory: F,
        decoder: D,
        events: mpsc::UnboundedSender<ConnectionEvent<D::Command>>,
    ) -> Self {
        Self::with_id(ConnectionId::new(), config, factory, decoder, events)
    }

    /// Creates a disconnected connection with a caller-chosen identity.
    pub fn with_id(
        id: ConnectionId,
        config: ConnectionConfig,
        factory: F,
        decoder: D,
        events: mpsc::UnboundedSender<ConnectionEvent<D::Command>>,
    ) -> Self {
        let reads = ReadAssembler::new(config.max_frame_size);
        Self {
            id,
            config,
            factory,
            decoder,
            transport: None,
            generation: Generation::INITIAL,
            state: ConnectionState::Disconnected,
            writes: WriteQueue::new(),
            reads,
            events,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Generation of the current (or most recent) transport handle.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn pending_write_bytes(&self) -> usize {
        self.writes.pending_bytes()
    }

    pub fn in_flight_bytes(&self) -> usize {
        self.writes.in_flight()
    }

    pub fn buffered_read_bytes(&self) -> usize {
        self.reads.buffered()
    }

    // ── Owner operations ──────────────────────────────────────────────────────

    /// Replaces the transport handle with a new one and starts connecting.
    ///
    /// Any previous handle is dropped without waiting for it to finish; its
    /// late events are ignored because they carry the old generation.  Queued
    /// outbound bytes and any partial inbound frame are discarded.  Does
    /// nothing while already `Connected`.
    pub fn connect(&mut self) {
        if self.state == ConnectionState::Connected {
            debug!(connection = %self.id, "connect() ignored: already connected");
            return;
        }
        let generation = self.replace_transport();
        let mut transport = self.factory.open(generation);
        transport.connect_to(&self.config.endpoint);
        self.transport = Some(transport);
        debug!(
            connection = %self.id,
            %generation,
            endpoint = %self.config.endpoint,
            "connecting"
        );
        self.set_state(ConnectionState::Connecting);
    }

    /// Installs a handle that is already connected, such as one accepted by a
    /// listener, and reports `Connected`.
    ///
    /// `open` receives the generation the handle must tag its events with.
    pub fn adopt<O>(&mut self, open: O)
    where
        O: FnOnce(Generation) -> F::Transport,
    {
        let generation = self.replace_transport();
        self.transport = Some(open(generation));
        debug!(connection = %self.id, %generation, "adopted connected transport");
        self.set_state(ConnectionState::Connected);
    }

    /// Releases the transport handle.
    ///
    /// Unsent bytes and any partially received frame are discarded.  No state
    /// change is reported; the owner asked for this.
    ///
    /// # Panics
    ///
    /// Panics if there is no transport handle.
    pub fn close(&mut self) {
        assert!(
            self.transport.is_some(),
            "close() called on connection {} without an active transport",
            self.id
        );
        let discarded = self.writes.pending_bytes();
        self.release_transport();
        debug!(connection = %self.id, discarded, "closed");
    }

    /// Encodes `command` and queues it for writing.
    ///
    /// Never blocks and never fails: a transport failure surfaces as a
    /// `StateChanged` event instead.
    ///
    /// # Panics
    ///
    /// Panics if there is no transport handle, or if the command's id is
    /// empty.
    pub fn send<C: Command + ?Sized>(&mut self, command: &C) {
        assert!(
            self.transport.is_some(),
            "send() called on connection {} without an active transport",
            self.id
        );
        let bytes = frame::encode_command(command);
        trace!(
            connection = %self.id,
            id = command.string_id(),
            len = bytes.len(),
            "queueing command"
        );
        if self.writes.enqueue(&bytes) {
            self.flush();
        }
    }

    // ── Transport events ──────────────────────────────────────────────────────

    /// Applies one transport event.
    ///
    /// Events from a superseded or released handle are ignored.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if event.generation != self.generation || self.transport.is_none() {
            trace!(
                connection = %self.id,
                current = %self.generation,
                stale = %event.generation,
                kind = ?event.kind,
                "ignoring stale transport event"
            );
            return;
        }
        match event.kind {
            TransportEventKind::Connected => self.set_state(ConnectionState::Connected),
            TransportEventKind::Disconnected => self.set_state(ConnectionState::Disconnected),
            TransportEventKind::Error(code) => {
                warn!(connection = %self.id, %code, "transport error");
                self.set_state(ConnectionState::Error);
            }
            TransportEventKind::Readable => self.on_readable(),
            TransportEventKind::BytesWritten(written) => self.on_bytes_written(written),
        }
    }

    fn on_bytes_written(&mut self, written: usize) {
        match self.writes.complete(written) {
            Completion::Flush => self.flush(),
            Completion::Drained => {
                trace!(connection = %self.id, "all queued data written");
                self.emit(ConnectionEvent::AllWritten { connection: self.id });
            }
            Completion::Waiting => {}
        }
    }

    fn on_readable(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let chunk = transport.read_available();
        self.reads.push(&chunk);

        loop {
            match self.reads.next_frame() {
                Ok(Some(frame)) => self.dispatch(frame),
                Ok(None) => break,
                Err(err) => {
                    error!(
                        connection = %self.id,
                        error = %err,
                        "inbound framing violated; closing connection"
                    );
                    self.release_transport();
                    self.set_state(ConnectionState::Error);
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, frame: RawFrame) {
        match self.decoder.decode(&frame.id, &frame.payload) {
            Ok(command) => {
                trace!(connection = %self.id, id = %frame.id, "command received");
                self.emit(ConnectionEvent::CommandReceived {
                    command,
                    connection: self.id,
                });
            }
            Err(err) => {
                warn!(connection = %self.id, error = %err, "dropping undecodable command");
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn flush(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(err) = self.writes.flush(transport) {
            let discarded = self.writes.reset();
            warn!(
                connection = %self.id,
                error = %err,
                discarded,
                "write failed; abandoning queued data"
            );
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Drops the current handle and returns the generation for the next one.
    fn replace_transport(&mut self) -> Generation {
        self.release_transport();
        self.generation = self.generation.next();
        self.generation
    }

    fn release_transport(&mut self) {
        self.transport = None;
        self.writes.reset();
        self.reads.clear();
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        debug!(connection = %self.id, %state, "state changed");
        self.emit(ConnectionEvent::StateChanged {
            state,
            connection: self.id,
        });
    }

    fn emit(&self, event: ConnectionEvent<D::Command>) {
        if self.events.send(event).is_err() {
            trace!(connection = %self.id, "owner dropped the event receiver");
        }
    }
}

impl<F, D> fmt::Debug for Connection<F, D>
where
    F: TransportFactory,
    D: CommandDecoder,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("has_transport", &self.transport.is_some())
            .field("writes", &self.writes)
            .field("reads", &self.reads)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
