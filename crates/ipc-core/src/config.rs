//! Connection tunables.
//!
//! [`ConnectionConfig`] is a plain serde struct so binaries can embed it in
//! their own TOML files.  Fields missing from a file fall back to the
//! `default_*` helpers below.

use serde::{Deserialize, Serialize};

/// Default ceiling for a single inbound frame: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Default endpoint name.  Adapters resolve bare names to a platform path.
pub const DEFAULT_ENDPOINT: &str = "ipc-peer.sock";

/// Settings for one [`Connection`](crate::Connection).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Endpoint passed to [`Transport::connect_to`](crate::Transport::connect_to).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Largest inbound frame (header, id and payload) the read side accepts.
    /// A larger declared size means the peers are out of sync and the
    /// connection is closed with an error.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: u32,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_max_frame_size() -> u32 {
    DEFAULT_MAX_FRAME_SIZE
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl ConnectionConfig {
    /// Default settings pointed at `endpoint`.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}
