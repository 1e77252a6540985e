//! The `serve` side: accept peers and answer their commands.
//!
//! Every accepted stream gets its own [`Session`] and a small responder task:
//!
//! | Received   | Response                                         |
//! |------------|--------------------------------------------------|
//! | `Ping`     | `Pong` with the same token                       |
//! | `Echo`     | the same `Echo` back                             |
//! | `Shutdown` | close this session and stop accepting new peers  |
//! | `Pong`     | logged and ignored                               |
//!
//! A peer that disconnects or errors has its session closed.

use std::future::Future;
use std::sync::Arc;

use ipc_core::{ConnectionConfig, ConnectionEvent, ConnectionState};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::session::Session;
use crate::domain::PeerCommand;
use crate::infrastructure::LocalSocketListener;
use crate::PeerError;

/// Accepts peers on `listener` until `shutdown` resolves or a peer sends
/// `Shutdown`.
///
/// After a `Shutdown` command, waits for the remaining sessions to end.
/// After `shutdown` resolves, open sessions are dropped.
///
/// Returns the number of peers served.
///
/// # Errors
///
/// Accept failures are logged and do not end the loop; this currently always
/// returns `Ok`.
pub async fn serve<S>(
    listener: LocalSocketListener,
    config: ConnectionConfig,
    shutdown: S,
) -> Result<usize, PeerError>
where
    S: Future<Output = ()>,
{
    let stop = Arc::new(Notify::new());
    let mut peers = JoinSet::new();
    let mut served = 0usize;
    tokio::pin!(shutdown);

    info!(path = %listener.path().display(), "serving");

    let drain = loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown requested; dropping open sessions");
                break false;
            }
            () = stop.notified() => {
                info!("peer requested shutdown; no longer accepting");
                break true;
            }
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    served += 1;
                    peers.spawn(serve_peer(stream, config.clone(), Arc::clone(&stop)));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            Some(joined) = peers.join_next(), if !peers.is_empty() => log_peer_result(joined),
        }
    };

    if drain {
        while let Some(joined) = peers.join_next().await {
            log_peer_result(joined);
        }
    } else {
        peers.shutdown().await;
    }

    info!(served, "server stopped");
    Ok(served)
}

fn log_peer_result(joined: Result<Result<(), PeerError>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "peer session failed"),
        Err(e) => warn!(error = %e, "peer task failed"),
    }
}

/// Runs one accepted peer until it disconnects or asks for shutdown.
async fn serve_peer(
    stream: UnixStream,
    config: ConnectionConfig,
    stop: Arc<Notify>,
) -> Result<(), PeerError> {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (session, handle) = Session::adopt(config, stream, events_tx);
    let id = handle.id();
    let task = tokio::spawn(session.run());
    info!(connection = %id, "peer connected");

    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::CommandReceived { command, .. } => match command {
                PeerCommand::Ping { token } => handle.send(PeerCommand::Pong { token })?,
                PeerCommand::Echo { text } => handle.send(PeerCommand::Echo { text })?,
                PeerCommand::Shutdown => {
                    info!(connection = %id, "shutdown received");
                    stop.notify_one();
                    handle.close()?;
                    break;
                }
                PeerCommand::Pong { token } => {
                    debug!(connection = %id, token, "ignoring unsolicited pong");
                }
            },
            ConnectionEvent::StateChanged {
                state: state @ (ConnectionState::Disconnected | ConnectionState::Error),
                ..
            } => {
                info!(connection = %id, %state, "peer gone");
                handle.close()?;
                break;
            }
            ConnectionEvent::StateChanged { .. } | ConnectionEvent::AllWritten { .. } => {}
        }
    }

    task.await?;
    Ok(())
}
