//! The run loop that owns one [`Connection`].
//!
//! `Connection` is synchronous and single-threaded.  [`Session::run`] gives it
//! a home: one tokio task that serializes two inputs into it, strictly one at
//! a time:
//!
//! ```text
//!   LocalSocket background tasks ──TransportEvent──┐
//!                                                   ├──► Session::run ──► Connection
//!   SessionHandle (owner)        ──SessionRequest──┘                        │
//!                                                                           ▼
//!                                                      owner ◄── ConnectionEvent<PeerCommand>
//! ```
//!
//! The owner never touches the `Connection` directly.  It sends requests
//! through a cloneable [`SessionHandle`] and reads results from the event
//! channel it passed in.

use ipc_core::{
    CommandRegistry, Connection, ConnectionConfig, ConnectionEvent, ConnectionId, TransportEvent,
};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::{registry, PeerCommand};
use crate::infrastructure::{LocalSocket, LocalSocketFactory};
use crate::PeerError;

/// The concrete connection type every session drives.
pub type PeerConnection = Connection<LocalSocketFactory, CommandRegistry<PeerCommand>>;

/// Events a session reports to its owner.
pub type PeerEvent = ConnectionEvent<PeerCommand>;

/// Owner requests delivered to the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    /// Queue a command for writing.
    Send(PeerCommand),
    /// Release the transport and end the run loop.
    Close,
}

/// A connection plus the two queues that feed it.
pub struct Session {
    connection: PeerConnection,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    requests: mpsc::UnboundedReceiver<SessionRequest>,
}

impl Session {
    /// Creates a session and starts connecting to `config.endpoint`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        config: ConnectionConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> (Self, SessionHandle) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let mut connection =
            Connection::new(config, LocalSocketFactory::new(transport_tx), registry(), events);
        connection.connect();
        Self::assemble(connection, transport_rx)
    }

    /// Creates a session around a stream accepted by a listener.  The owner
    /// receives `Connected` straight away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn adopt(
        config: ConnectionConfig,
        stream: UnixStream,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> (Self, SessionHandle) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let factory = LocalSocketFactory::new(transport_tx.clone());
        let mut connection = Connection::new(config, factory, registry(), events);
        connection.adopt(|generation| LocalSocket::from_stream(stream, generation, transport_tx));
        Self::assemble(connection, transport_rx)
    }

    fn assemble(
        connection: PeerConnection,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> (Self, SessionHandle) {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            id: connection.id(),
            requests: requests_tx,
        };
        let session = Self {
            connection,
            transport_events,
            requests: requests_rx,
        };
        (session, handle)
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Drives the connection until the owner asks to close or drops every
    /// [`SessionHandle`].
    pub async fn run(mut self) {
        let id = self.connection.id();
        debug!(connection = %id, "session started");

        loop {
            tokio::select! {
                Some(event) = self.transport_events.recv() => {
                    self.connection.handle_event(event);
                }
                request = self.requests.recv() => match request {
                    Some(SessionRequest::Send(command)) => {
                        if self.connection.has_transport() {
                            self.connection.send(&command);
                        } else {
                            warn!(connection = %id, ?command, "no transport; dropping command");
                        }
                    }
                    Some(SessionRequest::Close) | None => {
                        if self.connection.has_transport() {
                            self.connection.close();
                        }
                        break;
                    }
                },
            }
        }

        debug!(connection = %id, "session ended");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

/// Cloneable owner-side handle to a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ConnectionId,
    requests: mpsc::UnboundedSender<SessionRequest>,
}

impl SessionHandle {
    /// Identity of the session's connection, as carried by its events.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `command` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::SessionClosed`] when the run loop has ended.
    pub fn send(&self, command: PeerCommand) -> Result<(), PeerError> {
        self.requests
            .send(SessionRequest::Send(command))
            .map_err(|_| PeerError::SessionClosed)
    }

    /// Asks the run loop to release the transport and stop.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::SessionClosed`] when the run loop has already ended.
    pub fn close(&self) -> Result<(), PeerError> {
        self.requests
            .send(SessionRequest::Close)
            .map_err(|_| PeerError::SessionClosed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ipc_core::{encode_command, ConnectionState};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<PeerEvent>) -> PeerEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_adopted_session_reports_connected_first() {
        let (ours, _theirs) = UnixStream::pair().expect("socket pair");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (session, handle) = Session::adopt(ConnectionConfig::default(), ours, tx);

        assert_eq!(session.id(), handle.id());
        assert_eq!(
            next_event(&mut rx).await,
            ConnectionEvent::StateChanged {
                state: ConnectionState::Connected,
                connection: handle.id(),
            }
        );
    }

    #[tokio::test]
    async fn test_inbound_frame_becomes_typed_command() {
        // Arrange
        let (ours, mut theirs) = UnixStream::pair().expect("socket pair");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (session, handle) = Session::adopt(ConnectionConfig::default(), ours, tx);
        let task = tokio::spawn(session.run());
        next_event(&mut rx).await; // Connected

        // Act
        theirs
            .write_all(&encode_command(&PeerCommand::Ping { token: 42 }))
            .await
            .unwrap();

        // Assert
        assert_eq!(
            next_event(&mut rx).await,
            ConnectionEvent::CommandReceived {
                command: PeerCommand::Ping { token: 42 },
                connection: handle.id(),
            }
        );
        handle.close().unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_writes_frame_and_reports_all_written() {
        // Arrange
        let (ours, mut theirs) = UnixStream::pair().expect("socket pair");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (session, handle) = Session::adopt(ConnectionConfig::default(), ours, tx);
        let task = tokio::spawn(session.run());
        next_event(&mut rx).await; // Connected
        let expected = encode_command(&PeerCommand::Echo { text: "hi".to_string() });

        // Act
        handle.send(PeerCommand::Echo { text: "hi".to_string() }).unwrap();
        let mut buf = vec![0u8; expected.len()];
        timeout(WAIT, theirs.read_exact(&mut buf)).await.unwrap().unwrap();

        // Assert
        assert_eq!(buf, expected);
        assert_eq!(
            next_event(&mut rx).await,
            ConnectionEvent::AllWritten { connection: handle.id() }
        );
        handle.close().unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropping_every_handle_ends_the_run_loop() {
        let (ours, _theirs) = UnixStream::pair().expect("socket pair");
        let (tx, _rx) = mpsc::unbounded_channel();
        let (session, handle) = Session::adopt(ConnectionConfig::default(), ours, tx);
        let task = tokio::spawn(session.run());

        drop(handle);

        timeout(WAIT, task).await.expect("run loop ends").unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_closed_session() {
        let (ours, _theirs) = UnixStream::pair().expect("socket pair");
        let (tx, _rx) = mpsc::unbounded_channel();
        let (session, handle) = Session::adopt(ConnectionConfig::default(), ours, tx);
        drop(session);

        assert!(matches!(handle.send(PeerCommand::Shutdown), Err(PeerError::SessionClosed)));
        assert!(matches!(handle.close(), Err(PeerError::SessionClosed)));
    }
}
