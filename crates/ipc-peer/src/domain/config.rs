//! Peer configuration types.
//!
//! [`PeerConfig`] is the single source of truth for runtime settings.  It is
//! read from an optional TOML file (see
//! [`load_config`](crate::infrastructure::config_file::load_config)) and then
//! patched with command-line overrides.
//!
//! ```toml
//! log_level = "debug"
//!
//! [connection]
//! endpoint = "/run/user/1000/app.sock"
//! max_frame_size = 1048576
//! ```

use ipc_core::ConnectionConfig;
use serde::{Deserialize, Serialize};

/// All runtime configuration for an `ipc-peer` process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerConfig {
    /// Fallback `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Settings handed to every `Connection` this process creates.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            connection: ConnectionConfig::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
