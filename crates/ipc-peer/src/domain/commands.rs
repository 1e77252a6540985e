//! The command set spoken by `ipc-peer` processes.
//!
//! Each variant travels as one frame whose string id is the variant name and
//! whose payload is the variant's fields, serialized with `bincode`.
//!
//! | Command    | Id           | Payload          | Sent by        |
//! |------------|--------------|------------------|----------------|
//! | `Ping`     | `"Ping"`     | `u64` token      | client         |
//! | `Pong`     | `"Pong"`     | `u64` token      | server         |
//! | `Echo`     | `"Echo"`     | UTF-8 `String`   | either side    |
//! | `Shutdown` | `"Shutdown"` | empty            | client         |

use std::borrow::Cow;

use ipc_core::{Command, CommandRegistry};
use serde::Serialize;

pub const PING_ID: &str = "Ping";
pub const PONG_ID: &str = "Pong";
pub const ECHO_ID: &str = "Echo";
pub const SHUTDOWN_ID: &str = "Shutdown";

/// A typed command exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
    /// Liveness check; the server answers with a `Pong` carrying the same token.
    Ping { token: u64 },
    /// Reply to `Ping`.
    Pong { token: u64 },
    /// Text the server sends straight back.
    Echo { text: String },
    /// Asks the server to end this session and stop accepting new ones.
    Shutdown,
}

impl Command for PeerCommand {
    fn string_id(&self) -> &str {
        match self {
            Self::Ping { .. } => PING_ID,
            Self::Pong { .. } => PONG_ID,
            Self::Echo { .. } => ECHO_ID,
            Self::Shutdown => SHUTDOWN_ID,
        }
    }

    fn payload(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Ping { token } | Self::Pong { token } => Cow::Owned(encode_body(token)),
            Self::Echo { text } => Cow::Owned(encode_body(text)),
            Self::Shutdown => Cow::Borrowed(&[]),
        }
    }
}

fn encode_body<T: Serialize + ?Sized>(body: &T) -> Vec<u8> {
    // Integers and strings cannot fail to serialize into a Vec.
    bincode::serialize(body).expect("bincode serialization of a plain value into a Vec")
}

/// Builds the decoder for every [`PeerCommand`].
pub fn registry() -> CommandRegistry<PeerCommand> {
    CommandRegistry::new()
        .with(PING_ID, |payload| {
            Ok(PeerCommand::Ping {
                token: bincode::deserialize(payload)?,
            })
        })
        .with(PONG_ID, |payload| {
            Ok(PeerCommand::Pong {
                token: bincode::deserialize(payload)?,
            })
        })
        .with(ECHO_ID, |payload| {
            Ok(PeerCommand::Echo {
                text: bincode::deserialize(payload)?,
            })
        })
        .with(SHUTDOWN_ID, |_| Ok(PeerCommand::Shutdown))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
