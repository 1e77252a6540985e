//! Binary codec for local IPC frames.
//!
//! Wire format:
//! ```text
//! [payload_len:4][id_len:4][id:id_len][payload:payload_len]
//! ```
//! Header size: 8 bytes.  Both length fields are `u32` in the **native** byte
//! order of the host.  Both peers run on the same machine, so the byte order
//! is never negotiated or converted.
//!
//! The codec is split into a predicate ([`can_extract`]) and a consumer
//! ([`extract`]).  Callers gate every `extract` with `can_extract`; this is
//! what lets the read side tolerate partial and coalesced socket deliveries.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

use super::command::Command;

/// Size of the fixed frame header: two `u32` length fields.
pub const FRAME_HEADER_SIZE: usize = 8;

const LEN_FIELD_SIZE: usize = 4;

/// Errors raised when an inbound frame header cannot belong to a valid frame.
///
/// These indicate that the two peers have lost framing synchronisation and
/// are fatal to the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The declared frame size is larger than the configured ceiling.
    #[error("frame of {declared} bytes exceeds the {limit}-byte limit")]
    FrameTooLarge { declared: u64, limit: u64 },

    /// The header declares a zero-length command id.
    #[error("frame header declares an empty command id")]
    EmptyId,
}

/// The two length fields at the front of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_len: u32,
    pub id_len: u32,
}

impl FrameHeader {
    /// Total size of the frame this header describes, header included.
    ///
    /// Computed in `u64` so that two maximal `u32` lengths cannot overflow on
    /// 32-bit targets.
    pub fn frame_len(&self) -> u64 {
        FRAME_HEADER_SIZE as u64 + u64::from(self.id_len) + u64::from(self.payload_len)
    }

    /// Rejects headers that no well-behaved peer could have produced.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyId`] for a zero id length and
    /// [`ProtocolError::FrameTooLarge`] when the whole frame would exceed
    /// `max_frame_size` bytes.
    pub fn validate(&self, max_frame_size: u32) -> Result<(), ProtocolError> {
        if self.id_len == 0 {
            return Err(ProtocolError::EmptyId);
        }
        let declared = self.frame_len();
        if declared > u64::from(max_frame_size) {
            return Err(ProtocolError::FrameTooLarge {
                declared,
                limit: u64::from(max_frame_size),
            });
        }
        Ok(())
    }
}

/// One complete frame removed from a read buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// The command's string identifier.
    pub id: String,
    /// The opaque command body.
    pub payload: Bytes,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Returns the number of bytes [`encode_frame`] would produce.
pub fn encoded_len(id: &str, payload: &[u8]) -> usize {
    FRAME_HEADER_SIZE + id.len() + payload.len()
}

/// Encodes a command id and payload into one frame.
///
/// # Panics
///
/// Panics if `id` is empty, or if `id` or `payload` is longer than
/// `u32::MAX` bytes.  Both are caller bugs: every command carries a
/// non-empty identifier.
///
/// # Examples
///
/// ```rust
/// use ipc_core::protocol::{encode_frame, extract, can_extract};
/// use bytes::BytesMut;
///
/// let bytes = encode_frame("PING", &[]);
/// assert_eq!(bytes.len(), 12);
///
/// let mut buf = BytesMut::from(&bytes[..]);
/// assert!(can_extract(&buf));
/// let frame = extract(&mut buf);
/// assert_eq!(frame.id, "PING");
/// assert!(buf.is_empty());
/// ```
pub fn encode_frame(id: &str, payload: &[u8]) -> Vec<u8> {
    assert!(!id.is_empty(), "frame id must not be empty");
    let id_len = length_field(id.len(), "id");
    let payload_len = length_field(payload.len(), "payload");

    let mut buf = Vec::with_capacity(encoded_len(id, payload));
    buf.extend_from_slice(&payload_len.to_ne_bytes());
    buf.extend_from_slice(&id_len.to_ne_bytes());
    buf.extend_from_slice(id.as_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Encodes a [`Command`] using its string id and payload.
///
/// # Panics
///
/// Same preconditions as [`encode_frame`].
pub fn encode_command<C: Command + ?Sized>(command: &C) -> Vec<u8> {
    encode_frame(command.string_id(), &command.payload())
}

/// Reads the two length fields without consuming anything.
///
/// Returns `None` while fewer than [`FRAME_HEADER_SIZE`] bytes are buffered.
pub fn peek_header(buf: &[u8]) -> Option<FrameHeader> {
    if buf.len() < FRAME_HEADER_SIZE {
        return None;
    }
    Some(FrameHeader {
        payload_len: read_u32(buf, 0),
        id_len: read_u32(buf, LEN_FIELD_SIZE),
    })
}

/// Returns `true` when `buf` starts with at least one complete frame.
pub fn can_extract(buf: &[u8]) -> bool {
    peek_header(buf).is_some_and(|header| buf.len() as u64 >= header.frame_len())
}

/// Removes exactly one frame from the front of `buf`.
///
/// Bytes after the frame are left in place, in order, for the next call.
///
/// # Panics
///
/// Panics if `buf` does not start with a complete frame.  Gate every call with
/// [`can_extract`].
pub fn extract(buf: &mut BytesMut) -> RawFrame {
    let header = match peek_header(buf) {
        Some(header) if buf.len() as u64 >= header.frame_len() => header,
        _ => panic!(
            "extract called without a complete frame ({} bytes buffered)",
            buf.len()
        ),
    };

    // frame_len fits in usize here: it is no larger than buf.len().
    let mut frame = buf.split_to(header.frame_len() as usize);
    frame.advance(FRAME_HEADER_SIZE);
    let id_bytes = frame.split_to(header.id_len as usize);

    RawFrame {
        id: String::from_utf8_lossy(&id_bytes).into_owned(),
        payload: frame.freeze(),
    }
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn length_field(len: usize, what: &str) -> u32 {
    match u32::try_from(len) {
        Ok(len) => len,
        Err(_) => panic!("frame {what} of {len} bytes does not fit a u32 length field"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
