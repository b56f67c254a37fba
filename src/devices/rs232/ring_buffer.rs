//! Fixed-capacity circular queue for bytes received from the host endpoint.
//!
//! Occupancy is derived from the head and tail indices, so one slot of the
//! backing array always stays unused: a buffer of `N` slots holds at most
//! `N - 1` bytes. When full, [`InputRingBuffer::push`] discards the oldest
//! byte, the same way a UART receive FIFO loses data on overrun.

/// Default number of storage slots for the receive buffer.
pub const INPUT_BUFFER_SLOTS: usize = 2048;

/// What happened to the queue on a [`InputRingBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The byte was appended without loss.
    Stored,
    /// The buffer was full; the oldest byte was discarded to make room.
    Overwrote,
}

/// Circular byte queue with a drop-oldest overflow policy.
pub struct InputRingBuffer<const N: usize = INPUT_BUFFER_SLOTS> {
    data: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> Default for InputRingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> InputRingBuffer<N> {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        assert!(N >= 2, "ring buffer needs at least two slots");
        Self {
            data: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// Maximum number of unread bytes the buffer can hold.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        (self.tail + N - self.head) % N
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        (self.tail + 1) % N == self.head
    }

    /// Append one byte at the tail.
    pub fn push(&mut self, byte: u8) -> PushOutcome {
        let outcome = if self.is_full() {
            self.head = (self.head + 1) % N;
            PushOutcome::Overwrote
        } else {
            PushOutcome::Stored
        };
        self.data[self.tail] = byte;
        self.tail = (self.tail + 1) % N;
        outcome
    }

    /// Append every byte of `bytes`, returning how many older bytes were lost.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .filter(|&&b| self.push(b) == PushOutcome::Overwrote)
            .count()
    }

    /// Remove the byte at the head, or `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.data[self.head];
        self.head = (self.head + 1) % N;
        Some(byte)
    }

    /// Move up to `out.len()` bytes into `out` in arrival order.
    ///
    /// Returns the number of bytes copied; slots past that count are left
    /// untouched.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let mut copied = 0;
        for slot in out.iter_mut() {
            match self.pop() {
                Some(byte) => {
                    *slot = byte;
                    copied += 1;
                }
                None => break,
            }
        }
        copied
    }

    /// Discard all unread bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut ring = InputRingBuffer::<16>::new();
        for b in 1..=10u8 {
            assert_eq!(ring.push(b), PushOutcome::Stored);
        }
        assert_eq!(ring.len(), 10);
        for b in 1..=10u8 {
            assert_eq!(ring.pop(), Some(b));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_pop_empty_is_none() {
        let mut ring = InputRingBuffer::<4>::new();
        assert_eq!(ring.pop(), None);
        ring.push(7);
        assert_eq!(ring.pop(), Some(7));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_wraparound_keeps_order() {
        let mut ring = InputRingBuffer::<4>::new();
        // Cycle the indices around the array several times.
        for round in 0..10u8 {
            ring.push(round);
            ring.push(round.wrapping_add(100));
            assert_eq!(ring.len(), 2);
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round.wrapping_add(100)));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut ring = InputRingBuffer::<4>::new();
        assert_eq!(ring.capacity(), 3);
        assert_eq!(ring.extend_from_slice(&[1, 2, 3]), 0);
        assert!(ring.is_full());

        assert_eq!(ring.push(4), PushOutcome::Overwrote);
        assert_eq!(ring.len(), ring.capacity());

        let mut out = [0u8; 3];
        assert_eq!(ring.drain_into(&mut out), 3);
        assert_eq!(out, [2, 3, 4]);
    }

    #[test]
    fn test_extend_counts_lost_bytes() {
        let mut ring = InputRingBuffer::<4>::new();
        assert_eq!(ring.extend_from_slice(&[1, 2, 3, 4, 5]), 2);
        assert_eq!(ring.pop(), Some(3));
    }

    #[test]
    fn test_drain_into_truncates() {
        let mut ring = InputRingBuffer::<8>::new();
        ring.extend_from_slice(&[0x10, 0x20]);

        let mut out = [0xAAu8; 4];
        assert_eq!(ring.drain_into(&mut out), 2);
        assert_eq!(out, [0x10, 0x20, 0xAA, 0xAA]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut ring = InputRingBuffer::<8>::new();
        ring.extend_from_slice(b"abc");
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn test_default_capacity() {
        let ring: InputRingBuffer = InputRingBuffer::new();
        assert_eq!(ring.capacity(), INPUT_BUFFER_SLOTS - 1);
    }
}
