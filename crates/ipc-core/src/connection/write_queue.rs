//! Outbound byte queue with partial-write accounting.
//!
//! # How partial writes work (for beginners)
//!
//! A non-blocking socket accepts only as many bytes as fit in the kernel's
//! send buffer.  Asking it to write 20 bytes may accept 5; the other 15 stay
//! with us until the socket reports progress.  The queue therefore tracks two
//! quantities:
//!
//! ```text
//!   enqueue()          flush()                    complete(k)
//!  ───────────►  [ pending buffer ] ──n bytes──► [ in flight ] ──k bytes──► done
//! ```
//!
//! - **pending**: encoded frame bytes not yet handed to the transport.
//! - **in flight**: bytes the transport accepted but has not confirmed.
//!
//! Every enqueued byte is in exactly one of the two places until it is
//! confirmed, so bytes are never duplicated or reordered.

use bytes::{Buf, BytesMut};

use crate::transport::{Transport, TransportError};

/// What the connection should do after a write-completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Pending bytes remain; flush again.
    Flush,
    /// The queue just became idle; notify the owner.
    Drained,
    /// Nothing to do until more completions arrive.
    Waiting,
}

/// Outbound queue owned by a single connection.
#[derive(Debug)]
pub struct WriteQueue {
    pending: BytesMut,
    in_flight: usize,
    drain_reported: bool,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            pending: BytesMut::new(),
            in_flight: 0,
            // Nothing was ever queued, so there is no drain to report.
            drain_reported: true,
        }
    }

    /// Appends one encoded frame.
    ///
    /// Returns `true` when the pending buffer was empty before the call, in
    /// which case the caller must flush immediately.  Otherwise a flush is
    /// already outstanding and will pick these bytes up.
    pub fn enqueue(&mut self, frame: &[u8]) -> bool {
        let was_empty = self.pending.is_empty();
        self.pending.extend_from_slice(frame);
        self.drain_reported = false;
        was_empty
    }

    /// Offers the whole pending buffer to `transport`.
    ///
    /// Returns the number of bytes accepted; they move from pending to in
    /// flight.  An empty queue is not offered to the transport at all.
    ///
    /// # Errors
    ///
    /// Propagates the transport's hard failure unchanged.  The queue is left
    /// as it was; the caller decides whether to [`reset`](Self::reset) it.
    pub fn flush<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize, TransportError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let accepted = transport.write(&self.pending)?.min(self.pending.len());
        self.pending.advance(accepted);
        self.in_flight += accepted;
        Ok(accepted)
    }

    /// Records that the transport finished writing `written` bytes.
    pub fn complete(&mut self, written: usize) -> Completion {
        self.in_flight = self.in_flight.saturating_sub(written);
        if !self.pending.is_empty() {
            Completion::Flush
        } else if self.in_flight == 0 && !self.drain_reported {
            self.drain_reported = true;
            Completion::Drained
        } else {
            Completion::Waiting
        }
    }

    /// Discards everything, pending and in flight.
    ///
    /// Returns the number of pending bytes that were never sent.
    pub fn reset(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.in_flight = 0;
        self.drain_reported = true;
        discarded
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// `true` when nothing is pending and nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Accepts up to the next scripted limit per write and records the bytes.
    #[derive(Default)]
    struct ThrottledTransport {
        limits: VecDeque<usize>,
        written: Vec<u8>,
        fail: bool,
    }

    impl ThrottledTransport {
        fn with_limits(limits: &[usize]) -> Self {
            Self {
                limits: limits.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Transport for ThrottledTransport {
        fn connect_to(&mut self, _endpoint: &str) {}

        fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
            if self.fail {
                return Err(TransportError::NotConnected);
            }
            let n = self.limits.pop_front().unwrap_or(usize::MAX).min(bytes.len());
            self.written.extend_from_slice(&bytes[..n]);
            Ok(n)
        }

        fn read_available(&mut self) -> Vec<u8> {
            Vec::new()
        }
    }

    #[test]
    fn test_enqueue_reports_whether_queue_was_empty() {
        let mut queue = WriteQueue::new();
        assert!(queue.enqueue(&[1, 2, 3]), "first enqueue must request a flush");
        assert!(!queue.enqueue(&[4]), "second enqueue must wait for the pending flush");
        assert_eq!(queue.pending_bytes(), 4);
    }

    #[test]
    fn test_flush_moves_accepted_prefix_in_flight() {
        // Arrange
        let mut queue = WriteQueue::new();
        let mut transport = ThrottledTransport::with_limits(&[5]);
        queue.enqueue(&[0u8; 20]);

        // Act
        let accepted = queue.flush(&mut transport).expect("flush");

        // Assert
        assert_eq!(accepted, 5);
        assert_eq!(queue.in_flight(), 5);
        assert_eq!(queue.pending_bytes(), 15);
    }

    #[test]
    fn test_partial_write_then_completion_drains_once() {
        // Arrange – 20 bytes, transport takes 5 then the remaining 15
        let mut queue = WriteQueue::new();
        let mut transport = ThrottledTransport::with_limits(&[5, 15]);
        let frame: Vec<u8> = (0..20).collect();
        queue.enqueue(&frame);
        queue.flush(&mut transport).unwrap();

        // Act / Assert – completion of 5 asks for another flush
        assert_eq!(queue.complete(5), Completion::Flush);
        assert_eq!(queue.flush(&mut transport).unwrap(), 15);
        assert_eq!(queue.pending_bytes(), 0);

        // Completion of the final 15 drains the queue exactly once
        assert_eq!(queue.complete(15), Completion::Drained);
        assert_eq!(queue.complete(0), Completion::Waiting);
        assert!(queue.is_idle());
        assert_eq!(transport.written, frame);
    }

    #[test]
    fn test_partial_completion_does_not_report_drain() {
        let mut queue = WriteQueue::new();
        let mut transport = ThrottledTransport::default();
        queue.enqueue(&[0u8; 10]);
        queue.flush(&mut transport).unwrap();

        assert_eq!(queue.complete(4), Completion::Waiting);
        assert_eq!(queue.complete(6), Completion::Drained);
    }

    #[test]
    fn test_frames_reach_transport_in_enqueue_order() {
        // Arrange – the first write stalls after 3 bytes
        let mut queue = WriteQueue::new();
        let mut transport = ThrottledTransport::with_limits(&[3]);
        queue.enqueue(b"first-frame");
        queue.flush(&mut transport).unwrap();
        queue.enqueue(b"second-frame");

        // Act
        queue.complete(3);
        queue.flush(&mut transport).unwrap();

        // Assert
        assert_eq!(transport.written, b"first-framesecond-frame");
    }

    #[test]
    fn test_flush_error_leaves_queue_untouched() {
        let mut queue = WriteQueue::new();
        let mut transport = ThrottledTransport {
            fail: true,
            ..ThrottledTransport::default()
        };
        queue.enqueue(&[1, 2, 3]);

        assert!(queue.flush(&mut transport).is_err());
        assert_eq!(queue.pending_bytes(), 3);
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn test_flush_of_empty_queue_does_not_touch_transport() {
        let mut queue = WriteQueue::new();
        let mut transport = ThrottledTransport {
            fail: true,
            ..ThrottledTransport::default()
        };
        assert_eq!(queue.flush(&mut transport).unwrap(), 0);
    }

    #[test]
    fn test_reset_discards_pending_and_in_flight() {
        let mut queue = WriteQueue::new();
        let mut transport = ThrottledTransport::with_limits(&[2]);
        queue.enqueue(&[0u8; 8]);
        queue.flush(&mut transport).unwrap();

        assert_eq!(queue.reset(), 6);
        assert!(queue.is_idle());
        assert_eq!(queue.complete(2), Completion::Waiting, "no drain after a reset");
    }

    #[test]
    fn test_completion_on_fresh_queue_is_not_a_drain() {
        let mut queue = WriteQueue::new();
        assert_eq!(queue.complete(0), Completion::Waiting);
    }
}
