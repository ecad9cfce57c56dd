//! Ring Buffer Implementation
//!
//! This module provides the core ring buffer for the Disruptor pattern.
//! The ring buffer is a pre-allocated circular array of events. It performs no
//! synchronization of its own: who may touch which slot, and when, is decided by
//! the [`Sequencer`] claim/publish protocol and the consumers' barriers.

use crate::disruptor::{is_power_of_two, DisruptorError, EventFactory, Result, Sequencer};
use std::cell::UnsafeCell;

/// The core ring buffer for storing events
///
/// Slot for sequence `s` is `s & (N - 1)`. `N` is fixed at construction.
///
/// # Type Parameters
/// * `T` - The event type stored in the buffer
pub struct RingBuffer<T> {
    /// Using `Box<[UnsafeCell<T>]>` for better memory layout than `Vec<T>`
    slots: Box<[UnsafeCell<T>]>,
    index_mask: u64,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with the specified size and event factory
    ///
    /// All `buffer_size` slots are populated eagerly.
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2
    pub fn new<F>(buffer_size: usize, event_factory: F) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        if !is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }

        let slots: Box<[UnsafeCell<T>]> = (0..buffer_size)
            .map(|_| UnsafeCell::new(event_factory.new_instance()))
            .collect();

        Ok(Self {
            slots,
            index_mask: (buffer_size - 1) as u64,
        })
    }

    #[inline]
    fn index(&self, sequence: u64) -> usize {
        (sequence & self.index_mask) as usize
    }

    /// Get a shared reference to the event at the specified sequence
    ///
    /// # Safety
    /// No thread may be writing the slot for `sequence` while the returned
    /// reference is alive. Consumers satisfy this by only reading sequences a
    /// barrier has certified as published and not yet released to producers.
    #[inline]
    pub unsafe fn get(&self, sequence: u64) -> &T {
        let index = self.index(sequence);
        // SAFETY: index is masked into bounds; aliasing is the caller's contract.
        &*self.slots.get_unchecked(index).get()
    }

    /// Get a mutable reference to the event at the specified sequence
    ///
    /// # Safety
    /// The caller must hold the claim for `sequence` (returned by
    /// [`Sequencer::next_n`] and not yet published), so no other reference to
    /// this slot exists.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub unsafe fn get_mut(&self, sequence: u64) -> &mut T {
        let index = self.index(sequence);
        // SAFETY: index is masked into bounds; exclusivity is the caller's contract.
        &mut *self.slots.get_unchecked(index).get()
    }

    /// Exclusive access to a slot when no other thread can observe the buffer
    pub fn slot_mut(&mut self, sequence: u64) -> &mut T {
        let index = self.index(sequence);
        self.slots[index].get_mut()
    }

    /// Get the size of the buffer
    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.slots.len()
    }

    /// Claim one slot, fill it through `translator`, and publish it
    ///
    /// Blocks while the ring is full.
    ///
    /// # Returns
    /// The published sequence
    pub fn publish_with<S, F>(&self, sequencer: &S, translator: F) -> Result<u64>
    where
        S: Sequencer + ?Sized,
        F: FnOnce(&mut T, u64),
    {
        debug_assert_eq!(sequencer.buffer_size(), self.buffer_size());
        let sequence = sequencer.next()?;
        // SAFETY: `sequence` was just claimed and is not yet published.
        translator(unsafe { self.get_mut(sequence) }, sequence);
        sequencer.publish(sequence);
        Ok(sequence)
    }

    /// Non-blocking variant of [`publish_with`](Self::publish_with)
    ///
    /// # Errors
    /// Returns `DisruptorError::InsufficientCapacity` if the ring is full
    pub fn try_publish_with<S, F>(&self, sequencer: &S, translator: F) -> Result<u64>
    where
        S: Sequencer + ?Sized,
        F: FnOnce(&mut T, u64),
    {
        debug_assert_eq!(sequencer.buffer_size(), self.buffer_size());
        let sequence = sequencer.try_next()?;
        // SAFETY: `sequence` was just claimed and is not yet published.
        translator(unsafe { self.get_mut(sequence) }, sequence);
        sequencer.publish(sequence);
        Ok(sequence)
    }

    /// Claim `n` consecutive slots, fill each through `translator`, publish them together
    ///
    /// # Returns
    /// The highest published sequence
    pub fn publish_batch_with<S, F>(&self, sequencer: &S, n: usize, mut translator: F) -> Result<u64>
    where
        S: Sequencer + ?Sized,
        F: FnMut(&mut T, u64),
    {
        debug_assert_eq!(sequencer.buffer_size(), self.buffer_size());
        let hi = sequencer.next_n(n)?;
        let lo = hi - (n as u64 - 1);
        for sequence in lo..=hi {
            // SAFETY: the whole range [lo, hi] is claimed and unpublished.
            translator(unsafe { self.get_mut(sequence) }, sequence);
        }
        sequencer.publish_range(lo, hi);
        Ok(hi)
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("buffer_size", &self.buffer_size())
            .finish()
    }
}

// SAFETY: RingBuffer<T> is Send and Sync when T is Send + Sync because:
// - The ring buffer uses UnsafeCell internally, but access is coordinated through sequencers
// - Every slot access goes through an `unsafe` accessor whose contract requires the claim/barrier protocol
// - The release/acquire pairs on sequences establish happens-before between writer and readers
unsafe impl<T: Send + Sync> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{
        initial_sequence_value, ClosureEventFactory, DefaultEventFactory, SequenceArena,
        SingleProducerSequencer, WaitStrategyType,
    };
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct TestEvent {
        value: u64,
    }

    #[test]
    fn test_ring_buffer_creation() {
        let buffer = RingBuffer::new(8, DefaultEventFactory::<TestEvent>::new()).unwrap();
        assert_eq!(buffer.buffer_size(), 8);
    }

    #[test]
    fn test_ring_buffer_invalid_size() {
        for size in [0usize, 3, 6, 1000] {
            match RingBuffer::new(size, DefaultEventFactory::<TestEvent>::new()) {
                Err(DisruptorError::InvalidBufferSize(s)) => assert_eq!(s, size),
                other => panic!("expected InvalidBufferSize, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_slots_are_prepopulated_by_factory() {
        let buffer =
            RingBuffer::new(4, ClosureEventFactory::new(|| TestEvent { value: 7 })).unwrap();
        for sequence in 0..4 {
            assert_eq!(unsafe { buffer.get(sequence) }.value, 7);
        }
    }

    #[test]
    fn test_ring_buffer_wrapping_access() {
        let mut buffer = RingBuffer::new(4, DefaultEventFactory::<TestEvent>::new()).unwrap();

        buffer.slot_mut(5).value = 55;
        assert_eq!(unsafe { buffer.get(1) }.value, 55);
        assert_eq!(unsafe { buffer.get(5 + 4 * 1000) }.value, 55);

        unsafe { buffer.get_mut(9) }.value = 99;
        assert_eq!(buffer.slot_mut(1).value, 99);
    }

    #[test]
    fn test_publish_with_writes_and_publishes() {
        let arena = Arc::new(SequenceArena::with_capacity(4));
        let sequencer =
            SingleProducerSequencer::new(4, Arc::clone(&arena), WaitStrategyType::BusySpin.create())
                .unwrap();
        let buffer = RingBuffer::new(4, DefaultEventFactory::<TestEvent>::new()).unwrap();

        let sequence = buffer
            .publish_with(&sequencer, |event, seq| event.value = seq * 2)
            .unwrap();

        assert_eq!(sequence, initial_sequence_value(4) + 1);
        assert!(sequencer.is_available(sequence));
        assert_eq!(unsafe { buffer.get(sequence) }.value, sequence * 2);
    }

    #[test]
    fn test_publish_batch_with() {
        let arena = Arc::new(SequenceArena::with_capacity(4));
        let sequencer =
            SingleProducerSequencer::new(8, Arc::clone(&arena), WaitStrategyType::BusySpin.create())
                .unwrap();
        let buffer = RingBuffer::new(8, DefaultEventFactory::<TestEvent>::new()).unwrap();

        let hi = buffer
            .publish_batch_with(&sequencer, 3, |event, seq| event.value = seq)
            .unwrap();

        assert_eq!(hi, 8 + 3);
        assert_eq!(sequencer.cursor_value(), hi);
        for seq in 9..=11 {
            assert_eq!(unsafe { buffer.get(seq) }.value, seq);
        }
    }

    #[test]
    fn test_try_publish_with_reports_full_ring() {
        let arena = Arc::new(SequenceArena::with_capacity(4));
        let sequencer =
            SingleProducerSequencer::new(2, Arc::clone(&arena), WaitStrategyType::BusySpin.create())
                .unwrap();
        let consumer = arena.allocate(initial_sequence_value(2)).unwrap();
        sequencer.add_gating_sequences(&[consumer]);
        let buffer = RingBuffer::new(2, DefaultEventFactory::<TestEvent>::new()).unwrap();

        buffer.try_publish_with(&sequencer, |e, s| e.value = s).unwrap();
        buffer.try_publish_with(&sequencer, |e, s| e.value = s).unwrap();
        assert!(matches!(
            buffer.try_publish_with(&sequencer, |e, s| e.value = s),
            Err(DisruptorError::InsufficientCapacity)
        ));
    }
}
