//! Command seams between the framing layer and the application's message types.
//!
//! The connection never interprets payloads.  Outbound, it only needs a
//! string id and the payload bytes ([`Command`]).  Inbound, it hands each
//! extracted `(id, payload)` pair to a [`CommandDecoder`] and forwards
//! whatever comes back.
//!
//! Two decoders ship with the crate:
//!
//! - [`RawDecoder`] passes frames through as [`RawCommand`]s.
//! - [`CommandRegistry`] maps each string id to a decode function, the usual
//!   choice when the application has a closed set of typed commands.

use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

/// Boxed error returned by registered decode functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decode function stored in a [`CommandRegistry`].
pub type DecodeFn<C> = fn(&[u8]) -> Result<C, BoxError>;

/// Errors produced while turning a frame into an application command.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder is registered for the frame's string id.
    #[error("unknown command id {0:?}")]
    UnknownCommand(String),

    /// The decoder for `id` rejected the payload.
    #[error("malformed payload for command {id:?}: {source}")]
    MalformedPayload {
        id: String,
        #[source]
        source: BoxError,
    },
}

/// An outbound application message.
pub trait Command {
    /// Non-empty identifier that selects the decoder on the receiving side.
    fn string_id(&self) -> &str;

    /// Serialized command body.  May be empty.
    fn payload(&self) -> Cow<'_, [u8]>;
}

/// Turns an inbound `(id, payload)` pair into an owned command.
pub trait CommandDecoder {
    type Command;

    /// # Errors
    ///
    /// Returns [`DecodeError`] when the id is unknown or the payload is
    /// malformed.
    fn decode(&self, id: &str, payload: &[u8]) -> Result<Self::Command, DecodeError>;
}

// ── Untyped commands ──────────────────────────────────────────────────────────

/// A command carried as its raw id and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub id: String,
    pub payload: Bytes,
}

impl RawCommand {
    pub fn new(id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

impl Command for RawCommand {
    fn string_id(&self) -> &str {
        &self.id
    }

    fn payload(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.payload)
    }
}

/// Decoder that accepts every frame as a [`RawCommand`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl CommandDecoder for RawDecoder {
    type Command = RawCommand;

    fn decode(&self, id: &str, payload: &[u8]) -> Result<RawCommand, DecodeError> {
        Ok(RawCommand::new(id, Bytes::copy_from_slice(payload)))
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Decoder that dispatches on the frame's string id.
///
/// # Examples
///
/// ```rust
/// use ipc_core::protocol::{CommandDecoder, CommandRegistry};
///
/// #[derive(Debug, PartialEq)]
/// enum Msg { Ping, Text(String) }
///
/// let registry = CommandRegistry::new()
///     .with("Ping", |_| Ok(Msg::Ping))
///     .with("Text", |p| Ok(Msg::Text(String::from_utf8(p.to_vec())?)));
///
/// assert_eq!(registry.decode("Ping", &[]).unwrap(), Msg::Ping);
/// assert!(registry.decode("Nope", &[]).is_err());
/// ```
pub struct CommandRegistry<C> {
    decoders: HashMap<String, DecodeFn<C>>,
}

impl<C> CommandRegistry<C> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `decode` for `id`, replacing any earlier registration.
    pub fn register(&mut self, id: impl Into<String>, decode: DecodeFn<C>) -> &mut Self {
        self.decoders.insert(id.into(), decode);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, id: impl Into<String>, decode: DecodeFn<C>) -> Self {
        self.register(id, decode);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.decoders.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for CommandRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("CommandRegistry").field("ids", &ids).finish()
    }
}

impl<C> CommandDecoder for CommandRegistry<C> {
    type Command = C;

    fn decode(&self, id: &str, payload: &[u8]) -> Result<C, DecodeError> {
        let decode = self
            .decoders
            .get(id)
            .ok_or_else(|| DecodeError::UnknownCommand(id.to_string()))?;
        decode(payload).map_err(|source| DecodeError::MalformedPayload {
            id: id.to_string(),
            source,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
