//! Sequence implementation for the Disruptor
//!
//! The Sequence is used to track progress through the ring buffer and coordinate
//! between producers and consumers. It provides atomic operations while preventing
//! false sharing by keeping the counter on its own cache line.
//!
//! Sequences are unsigned and start at the buffer size (see
//! [`initial_sequence_value`]), so the wrap point `claimed - buffer_size` never
//! underflows.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Initial value for every cursor and consumer watermark of a ring of `buffer_size` slots
///
/// The first claimable sequence is `buffer_size + 1`.
#[inline]
pub fn initial_sequence_value(buffer_size: usize) -> u64 {
    buffer_size as u64
}

/// A sequence number that prevents false sharing
///
/// The atomic value is wrapped in [`CachePadded`], which aligns it to (and pads it
/// out to) a full cache line so neighbouring fields never share its line.
pub struct Sequence {
    value: CachePadded<AtomicU64>,
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: u64) -> Self {
        Self {
            value: CachePadded::new(AtomicU64::new(initial_value)),
        }
    }

    /// Get the current sequence value (acquire)
    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Get the current sequence value without ordering guarantees
    ///
    /// Only meaningful on the thread that owns the sequence.
    #[inline]
    pub fn get_relaxed(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Set the sequence value (release)
    #[inline]
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }

    /// Set the sequence value without ordering guarantees
    #[inline]
    pub fn set_relaxed(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Atomically replace `expected` with `new`
    ///
    /// # Returns
    /// True if the swap happened
    #[inline]
    pub fn compare_and_set(&self, expected: u64, new: u64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Add `increment` and return the value before the addition
    #[inline]
    pub fn get_and_add(&self, increment: u64) -> u64 {
        self.value.fetch_add(increment, Ordering::AcqRel)
    }

    /// Relaxed fetch-add for single-writer paths
    #[inline]
    pub fn get_and_add_relaxed(&self, increment: u64) -> u64 {
        self.value.fetch_add(increment, Ordering::Relaxed)
    }

    /// Add `increment` and return the new value
    #[inline]
    pub fn add_and_get(&self, increment: u64) -> u64 {
        self.get_and_add(increment) + increment
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.get())
            .finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_creation() {
        let seq = Sequence::new(42);
        assert_eq!(seq.get(), 42);
        assert_eq!(seq.get_relaxed(), 42);
    }

    #[test]
    fn test_initial_value_is_buffer_size() {
        assert_eq!(initial_sequence_value(16), 16);
        assert_eq!(initial_sequence_value(1), 1);
    }

    #[test]
    fn test_sequence_set_get() {
        let seq = Sequence::new(0);
        seq.set(100);
        assert_eq!(seq.get(), 100);

        seq.set_relaxed(7);
        assert_eq!(seq.get(), 7);
    }

    #[test]
    fn test_sequence_add() {
        let seq = Sequence::new(10);
        assert_eq!(seq.add_and_get(5), 15);
        assert_eq!(seq.get_and_add(3), 15);
        assert_eq!(seq.get(), 18);
        assert_eq!(seq.get_and_add_relaxed(2), 18);
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn test_sequence_compare_and_set() {
        let seq = Sequence::new(10);

        assert!(seq.compare_and_set(10, 20));
        assert_eq!(seq.get(), 20);

        assert!(!seq.compare_and_set(10, 30));
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn test_sequence_occupies_own_cache_line() {
        assert!(std::mem::align_of::<Sequence>() >= 64);
        assert!(std::mem::size_of::<Sequence>() >= 64);
    }

    #[test]
    fn test_sequence_thread_safety() {
        let seq = Arc::new(Sequence::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let seq_clone = Arc::clone(&seq);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    seq_clone.get_and_add(1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seq.get(), 10000);
    }
}
