//! Generation tags for transport handles.
//!
//! # Why generations? (for beginners)
//!
//! A [`Connection`](crate::Connection) owns exactly one transport handle at a
//! time, but `connect()` may replace that handle while the old one still has
//! events queued (a late "bytes written", a "disconnected" from the socket
//! being torn down).  Those events must not touch the new connection's
//! buffers.
//!
//! Every handle is therefore opened with a fresh [`Generation`], and every
//! event the adapter posts carries the generation of the handle that produced
//! it.  The connection drops any event whose tag does not match the current
//! generation.

use std::fmt;

/// A monotonically increasing tag identifying one transport handle.
///
/// [`Generation::INITIAL`] is never given to a handle; the first handle a
/// connection opens receives `INITIAL.next()`.
///
/// # Examples
///
/// ```rust
/// use ipc_core::Generation;
///
/// let first = Generation::INITIAL.next();
/// assert_eq!(first.value(), 1);
/// assert!(first.next() > first);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation of a connection that has never opened a handle.
    pub const INITIAL: Generation = Generation(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the following generation.
    ///
    /// Wraps around from `u64::MAX` to 0 without panicking.  A connection
    /// would have to reconnect 2^64 times to observe the wrap.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_generation_is_zero() {
        assert_eq!(Generation::INITIAL.value(), 0);
        assert_eq!(Generation::default(), Generation::INITIAL);
    }

    #[test]
    fn test_next_increments_monotonically() {
        // Arrange
        let mut generation = Generation::INITIAL;

        // Act
        let values: Vec<Generation> = (0..100)
            .map(|_| {
                generation = generation.next();
                generation
            })
            .collect();

        // Assert – values must be strictly monotonically increasing
        for window in values.windows(2) {
            assert!(window[1] > window[0], "generations must increase");
        }
    }

    #[test]
    fn test_next_wraps_at_u64_max() {
        // Arrange
        let last = Generation::new(u64::MAX);

        // Act
        let wrapped = last.next();

        // Assert
        assert_eq!(wrapped, Generation::INITIAL, "generation must wrap to 0");
    }

    #[test]
    fn test_display_is_prefixed() {
        assert_eq!(Generation::new(7).to_string(), "gen-7");
    }
}
