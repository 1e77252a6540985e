//! Inbound frame reassembly.
//!
//! A socket is a stream protocol: there is no guarantee that a single read
//! returns exactly one frame.
//!
//! - It may return fewer bytes than a full frame (fragmented delivery).
//! - It may return bytes from several frames at once (coalesced delivery).
//!
//! [`ReadAssembler`] accumulates every chunk and hands out complete frames one
//! at a time until only a partial frame (or nothing) is left.

use bytes::BytesMut;

use crate::protocol::frame::{self, ProtocolError, RawFrame};

/// Inbound byte buffer owned by a single connection.
#[derive(Debug)]
pub struct ReadAssembler {
    buffer: BytesMut,
    max_frame_size: u32,
}

impl ReadAssembler {
    pub fn new(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Appends a chunk exactly as the transport delivered it.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Removes the next complete frame, if one is buffered.
    ///
    /// The header is validated as soon as its 8 bytes are available, so an
    /// absurd length is rejected before the buffer grows to match it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the buffered header cannot start a valid
    /// frame.  The buffer is left untouched; the stream is unusable from here.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, ProtocolError> {
        let Some(header) = frame::peek_header(&self.buffer) else {
            return Ok(None);
        };
        header.validate(self.max_frame_size)?;
        if !frame::can_extract(&self.buffer) {
            return Ok(None);
        }
        Ok(Some(frame::extract(&mut self.buffer)))
    }

    /// Pushes `chunk` and drains every complete frame it finished.
    ///
    /// # Errors
    ///
    /// Stops at the first invalid header; frames extracted before it are lost
    /// along with the stream.
    pub fn push_and_drain(&mut self, chunk: &[u8]) -> Result<Vec<RawFrame>, ProtocolError> {
        self.push(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Bytes buffered but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partially assembled frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
