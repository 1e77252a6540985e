//! ipc-peer library crate.
//!
//! Puts the `ipc-core` connection on a real Unix domain socket and gives it a
//! small typed command set, so two processes on one host can talk to each
//! other.
//!
//! # Architecture
//!
//! ```text
//! [ipc-peer]
//!   ├── domain/           PeerCommand set, PeerConfig
//!   ├── application/
//!   │     ├── session     Run loop: one Connection, one task
//!   │     ├── serve       Accept loop answering Ping / Echo / Shutdown
//!   │     └── client      ping and echo clients
//!   └── infrastructure/
//!         └── local_socket  Transport adapter over tokio::net::UnixStream
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O.
//! - `application` drives `ipc_core::Connection` and talks to the adapter only
//!   through the `Transport` / `TransportFactory` traits and event channels.
//! - `infrastructure` owns every socket and background task.

use std::path::PathBuf;

use ipc_core::ConnectionState;
use thiserror::Error;

/// Domain layer: command set and configuration (no I/O).
pub mod domain;

/// Application layer: session run loop, server and clients.
pub mod application;

/// Infrastructure layer: Unix domain socket transport.
pub mod infrastructure;

/// Errors surfaced by the server and client entry points.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The listening socket could not be created.
    #[error("failed to bind {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Accepting an inbound connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The session task is gone; no more requests can be delivered.
    #[error("session closed")]
    SessionClosed,

    /// The connection left `Connected` before the exchange finished.
    #[error("connection lost ({state})")]
    ConnectionLost { state: ConnectionState },

    /// The peer answered with something the exchange did not expect.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// A session task panicked or was cancelled.
    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
