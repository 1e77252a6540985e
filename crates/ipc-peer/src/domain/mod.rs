//! Domain layer for ipc-peer.
//!
//! Pure types with no I/O: the command set both sides speak and the
//! configuration structure.  File loading lives in `infrastructure`.

pub mod commands;
pub mod config;

pub use commands::{registry, PeerCommand};
pub use config::PeerConfig;
