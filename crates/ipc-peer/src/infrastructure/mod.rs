//! Infrastructure layer for ipc-peer.
//!
//! - `local_socket` – the Unix domain socket [`Transport`](ipc_core::Transport)
//!   adapter, its factory, and the listener used by `serve`.
//! - `config_file` – loading [`PeerConfig`](crate::domain::PeerConfig) from TOML.

pub mod config_file;
pub mod local_socket;

pub use config_file::{load_config, ConfigError};
pub use local_socket::{resolve_endpoint, LocalSocket, LocalSocketFactory, LocalSocketListener};
