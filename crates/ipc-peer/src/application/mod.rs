//! Application layer for ipc-peer.
//!
//! - `session` – the run loop that owns one `Connection`.
//! - `serve` – accept loop answering `Ping`, `Echo` and `Shutdown`.
//! - `client` – the `ping` and `echo` clients.

pub mod client;
pub mod serve;
pub mod session;

pub use client::{run_echo, run_ping, PingReport};
pub use serve::serve;
pub use session::{PeerConnection, PeerEvent, Session, SessionHandle, SessionRequest};
