//! The `ping` and `echo` clients.

use std::time::{Duration, Instant};

use ipc_core::{ConnectionConfig, ConnectionEvent, ConnectionState};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::application::session::{PeerEvent, Session, SessionHandle};
use crate::domain::PeerCommand;
use crate::PeerError;

/// Outcome of [`run_ping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReport {
    pub sent: u64,
    pub received: u64,
    pub elapsed: Duration,
}

/// Where the ping exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PingPhase {
    Connecting,
    AwaitingPongs,
    FlushingShutdown,
}

/// Connects to `config.endpoint`, sends `count` pings and waits for every pong.
///
/// With `shutdown_server` set, a `Shutdown` command follows the last pong and
/// the connection is closed once it has been written out.
///
/// # Errors
///
/// - [`PeerError::ConnectionLost`] if the connection fails or drops first.
/// - [`PeerError::UnexpectedReply`] if the server answers with anything but
///   a matching `Pong`.
pub async fn run_ping(
    config: ConnectionConfig,
    count: u64,
    shutdown_server: bool,
) -> Result<PingReport, PeerError> {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (session, handle) = Session::connect(config, events_tx);
    let task = tokio::spawn(session.run());
    let started = Instant::now();

    let mut phase = PingPhase::Connecting;
    let mut received = 0u64;

    let outcome = loop {
        let Some(event) = events.recv().await else {
            break Err(PeerError::SessionClosed);
        };
        match event {
            ConnectionEvent::StateChanged {
                state: ConnectionState::Connected,
                ..
            } if phase == PingPhase::Connecting => {
                info!(connection = %handle.id(), count, "connected; sending pings");
                for token in 0..count {
                    handle.send(PeerCommand::Ping { token })?;
                }
                phase = PingPhase::AwaitingPongs;
                if count == 0 {
                    match finish_pings(&handle, shutdown_server)? {
                        Some(next) => phase = next,
                        None => break Ok(()),
                    }
                }
            }
            ConnectionEvent::StateChanged {
                state: ConnectionState::Disconnected,
                ..
            } if phase == PingPhase::FlushingShutdown => {
                debug!("server closed after shutdown");
                break Ok(());
            }
            ConnectionEvent::StateChanged {
                state: state @ (ConnectionState::Disconnected | ConnectionState::Error),
                ..
            } => break Err(PeerError::ConnectionLost { state }),
            ConnectionEvent::CommandReceived {
                command: PeerCommand::Pong { token },
                ..
            } if phase == PingPhase::AwaitingPongs && token < count => {
                received += 1;
                trace!(token, received, "pong");
                if received == count {
                    match finish_pings(&handle, shutdown_server)? {
                        Some(next) => phase = next,
                        None => break Ok(()),
                    }
                }
            }
            ConnectionEvent::CommandReceived { command, .. } => {
                break Err(PeerError::UnexpectedReply(format!("{command:?}")));
            }
            ConnectionEvent::AllWritten { .. } if phase == PingPhase::FlushingShutdown => {
                debug!("shutdown written");
                break Ok(());
            }
            ConnectionEvent::StateChanged { .. } | ConnectionEvent::AllWritten { .. } => {}
        }
    };

    // The run loop may already be gone after a failure.
    let _ = handle.close();
    task.await?;

    outcome.map(|()| PingReport {
        sent: count,
        received,
        elapsed: started.elapsed(),
    })
}

/// Sends `Shutdown` when asked to; otherwise the exchange is complete.
fn finish_pings(
    handle: &SessionHandle,
    shutdown_server: bool,
) -> Result<Option<PingPhase>, PeerError> {
    if shutdown_server {
        handle.send(PeerCommand::Shutdown)?;
        Ok(Some(PingPhase::FlushingShutdown))
    } else {
        Ok(None)
    }
}

/// Connects to `config.endpoint`, sends `text` and returns the echoed text.
///
/// # Errors
///
/// - [`PeerError::ConnectionLost`] if the connection fails or drops first.
/// - [`PeerError::UnexpectedReply`] if the server answers with anything but
///   an `Echo`.
pub async fn run_echo(config: ConnectionConfig, text: String) -> Result<String, PeerError> {
    let (events_tx, mut events) = mpsc::unbounded_channel::<PeerEvent>();
    let (session, handle) = Session::connect(config, events_tx);
    let task = tokio::spawn(session.run());
    let mut request = Some(PeerCommand::Echo { text });

    let outcome = loop {
        let Some(event) = events.recv().await else {
            break Err(PeerError::SessionClosed);
        };
        match event {
            ConnectionEvent::StateChanged {
                state: ConnectionState::Connected,
                ..
            } => {
                if let Some(command) = request.take() {
                    handle.send(command)?;
                }
            }
            ConnectionEvent::StateChanged {
                state: state @ (ConnectionState::Disconnected | ConnectionState::Error),
                ..
            } => break Err(PeerError::ConnectionLost { state }),
            ConnectionEvent::CommandReceived {
                command: PeerCommand::Echo { text },
                ..
            } => break Ok(text),
            ConnectionEvent::CommandReceived { command, .. } => {
                break Err(PeerError::UnexpectedReply(format!("{command:?}")));
            }
            ConnectionEvent::StateChanged { .. } | ConnectionEvent::AllWritten { .. } => {}
        }
    };

    let _ = handle.close();
    task.await?;
    outcome
}
