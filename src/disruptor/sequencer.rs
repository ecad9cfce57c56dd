//! Sequencer Implementation
//!
//! This module provides sequencer implementations for coordinating access to the ring buffer.
//! Sequencers hand out sequence numbers to producers and make sure a producer never
//! claims a slot that the slowest gating consumer has not yet vacated.
//!
//! Two claim protocols are provided:
//!
//! - [`SingleProducerSequencer`]: one producer thread, a private claim counter and a
//!   cursor that doubles as the publication marker.
//! - [`MultiProducerSequencer`]: any number of producer threads, a fetch-add cursor
//!   and per-slot availability flags so out-of-order publication never exposes a gap.

use crate::disruptor::{
    initial_sequence_value, is_power_of_two, Backoff, CachedSequenceGroup, DisruptorError,
    ProcessingSequenceBarrier, ProducerType, Result, Sequence, SequenceArena, SequenceId,
    SharedSequenceGroup, WaitStrategy,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// Trait for sequencers that coordinate access to the ring buffer
pub trait Sequencer: Send + Sync + std::fmt::Debug {
    /// Get the buffer size
    fn buffer_size(&self) -> usize;

    /// Handle of the producer cursor inside [`arena`](Self::arena)
    fn cursor(&self) -> SequenceId;

    /// Current value of the producer cursor
    fn cursor_value(&self) -> u64 {
        self.arena().get(self.cursor()).get()
    }

    /// The arena holding the cursor and every gating sequence
    fn arena(&self) -> &Arc<SequenceArena>;

    /// The wait strategy consumers of this sequencer block on
    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy>;

    /// Reset the claim position
    ///
    /// Initialisation only; `sequence` must not be lower than the initial value.
    fn claim(&self, sequence: u64);

    /// Claim the next sequence number, blocking while the ring is full
    fn next(&self) -> Result<u64> {
        self.next_n(1)
    }

    /// Claim the next `n` sequence numbers, blocking while the ring is full
    ///
    /// # Returns
    /// The highest sequence number claimed
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBatchSize` unless `1 <= n <= buffer_size`
    fn next_n(&self, n: usize) -> Result<u64>;

    /// Claim the next sequence number without blocking
    fn try_next(&self) -> Result<u64> {
        self.try_next_n(1)
    }

    /// Claim the next `n` sequence numbers without blocking
    ///
    /// # Errors
    /// Returns `DisruptorError::InsufficientCapacity` if the ring cannot take `n` more
    /// events, or `DisruptorError::InvalidBatchSize` for an out-of-range `n`
    fn try_next_n(&self, n: usize) -> Result<u64>;

    /// Publish a sequence number
    fn publish(&self, sequence: u64);

    /// Publish a range of sequence numbers, both ends inclusive
    fn publish_range(&self, low: u64, high: u64);

    /// Check if a sequence has been published and not yet overwritten
    fn is_available(&self, sequence: u64) -> bool;

    /// Highest sequence `s` such that every sequence in `[next_sequence, s]` is published
    ///
    /// Returns `next_sequence - 1` when `next_sequence` itself is not yet published.
    fn get_highest_published_sequence(&self, next_sequence: u64, available_sequence: u64) -> u64;

    /// Add sequences that this sequencer must not overtake
    fn add_gating_sequences(&self, gating_sequences: &[SequenceId]);

    /// Remove a gating sequence
    ///
    /// # Returns
    /// True if the sequence was removed
    fn remove_gating_sequence(&self, sequence: SequenceId) -> bool;

    /// Minimum of the gating sequences and the cursor
    fn minimum_gating_sequence(&self) -> u64;

    /// Whether `required` more slots could be claimed right now
    fn has_available_capacity(&self, required: usize) -> bool;

    /// Number of slots that could be claimed right now
    fn remaining_capacity(&self) -> u64;

    /// Create a barrier over this sequencer
    ///
    /// With no `dependencies` the barrier gates on the producer cursor directly;
    /// otherwise it gates on the given consumer sequences.
    fn new_barrier(self: Arc<Self>, dependencies: &[SequenceId]) -> ProcessingSequenceBarrier;
}

fn validate_batch_size(n: usize, buffer_size: usize) -> Result<()> {
    if n < 1 || n > buffer_size {
        return Err(DisruptorError::InvalidBatchSize {
            requested: n,
            buffer_size,
        });
    }
    Ok(())
}

fn barrier_for(
    sequencer: Arc<dyn Sequencer>,
    dependencies: &[SequenceId],
) -> ProcessingSequenceBarrier {
    let arena = Arc::clone(sequencer.arena());
    let wait_strategy = Arc::clone(sequencer.wait_strategy());
    let direct_listener = dependencies.is_empty();
    let group = if direct_listener {
        CachedSequenceGroup::new(arena, &[sequencer.cursor()])
    } else {
        CachedSequenceGroup::new(arena, dependencies)
    };
    ProcessingSequenceBarrier::new(direct_listener, group, sequencer, wait_strategy)
}

/// Build the sequencer for `producer_type`
///
/// # Errors
/// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2, or
/// `DisruptorError::ArenaExhausted` if the arena has no room for the cursor
pub fn create_sequencer(
    producer_type: ProducerType,
    buffer_size: usize,
    arena: Arc<SequenceArena>,
    wait_strategy: Arc<dyn WaitStrategy>,
) -> Result<Arc<dyn Sequencer>> {
    Ok(match producer_type {
        ProducerType::Single => Arc::new(SingleProducerSequencer::new(
            buffer_size,
            arena,
            wait_strategy,
        )?),
        ProducerType::Multi => Arc::new(MultiProducerSequencer::new(
            buffer_size,
            arena,
            wait_strategy,
        )?),
    })
}

/// Single producer sequencer
///
/// Only one thread may claim. The claim counter is private and relaxed; the cursor
/// in the arena is the publication marker, so publishing is one release store.
///
/// The first thread to claim becomes the owner for the sequencer's lifetime. Claims
/// from any other thread fail with `DisruptorError::ProducerThreadMismatch`, so two
/// threads can never be handed the same slot.
pub struct SingleProducerSequencer {
    buffer_size: usize,
    arena: Arc<SequenceArena>,
    cursor: SequenceId,
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Highest sequence handed out by `next_n`
    latest_claimed: Sequence,
    /// Gating minimum as of the last rescan
    cached_gating: Sequence,
    gating_sequences: Mutex<CachedSequenceGroup>,
    owner: OnceLock<ThreadId>,
}

impl SingleProducerSequencer {
    /// Create a new single producer sequencer
    ///
    /// The cursor is allocated in `arena` at [`initial_sequence_value`].
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2
    pub fn new(
        buffer_size: usize,
        arena: Arc<SequenceArena>,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self> {
        if !is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }
        let initial = initial_sequence_value(buffer_size);
        let cursor = arena.allocate(initial)?;
        debug!(
            buffer_size,
            %cursor,
            wait_strategy = wait_strategy.name(),
            "created single producer sequencer"
        );

        Ok(Self {
            buffer_size,
            gating_sequences: Mutex::new(CachedSequenceGroup::new(Arc::clone(&arena), &[])),
            arena,
            cursor,
            wait_strategy,
            latest_claimed: Sequence::new(initial),
            cached_gating: Sequence::new(initial),
            owner: OnceLock::new(),
        })
    }

    #[inline]
    fn check_owner(&self) -> Result<()> {
        let current = thread::current().id();
        if *self.owner.get_or_init(|| current) == current {
            Ok(())
        } else {
            warn!(?current, "single producer sequencer claimed from a second thread");
            Err(DisruptorError::ProducerThreadMismatch)
        }
    }

    /// Rescan the gating group and refresh the cache
    fn refresh_gating(&self, claimed: u64) -> u64 {
        let minimum = self.gating_sequences.lock().get().min(claimed);
        self.cached_gating.set_relaxed(minimum);
        minimum
    }
}

impl std::fmt::Debug for SingleProducerSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleProducerSequencer")
            .field("buffer_size", &self.buffer_size)
            .field("cursor", &self.cursor_value())
            .field("latest_claimed", &self.latest_claimed.get_relaxed())
            .field("wait_strategy", &self.wait_strategy.name())
            .finish()
    }
}

impl Sequencer for SingleProducerSequencer {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn cursor(&self) -> SequenceId {
        self.cursor
    }

    fn arena(&self) -> &Arc<SequenceArena> {
        &self.arena
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }

    fn claim(&self, sequence: u64) {
        assert!(
            self.check_owner().is_ok(),
            "SingleProducerSequencer claimed by two threads - use ProducerType::Multi"
        );
        self.latest_claimed.set_relaxed(sequence);
    }

    fn next_n(&self, n: usize) -> Result<u64> {
        validate_batch_size(n, self.buffer_size)?;
        self.check_owner()?;

        let current = self.latest_claimed.get_relaxed();
        let next_sequence = current + n as u64;
        let wrap_point = next_sequence.saturating_sub(self.buffer_size as u64);
        let cached = self.cached_gating.get_relaxed();

        if wrap_point > cached || cached > current {
            let mut backoff = Backoff::new();
            while wrap_point > self.refresh_gating(current) {
                backoff.snooze();
            }
        }

        self.latest_claimed.set_relaxed(next_sequence);
        Ok(next_sequence)
    }

    fn try_next_n(&self, n: usize) -> Result<u64> {
        validate_batch_size(n, self.buffer_size)?;
        self.check_owner()?;

        if !self.has_available_capacity(n) {
            return Err(DisruptorError::InsufficientCapacity);
        }
        let next_sequence = self.latest_claimed.get_relaxed() + n as u64;
        self.latest_claimed.set_relaxed(next_sequence);
        Ok(next_sequence)
    }

    fn publish(&self, sequence: u64) {
        self.arena.get(self.cursor).set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, _low: u64, high: u64) {
        self.publish(high);
    }

    fn is_available(&self, sequence: u64) -> bool {
        let current = self.cursor_value();
        sequence <= current && sequence > current.saturating_sub(self.buffer_size as u64)
    }

    fn get_highest_published_sequence(&self, _next_sequence: u64, available_sequence: u64) -> u64 {
        available_sequence
    }

    fn add_gating_sequences(&self, gating_sequences: &[SequenceId]) {
        let mut group = self.gating_sequences.lock();
        group.add(gating_sequences);
        let minimum = group.get().min(self.latest_claimed.get_relaxed());
        self.cached_gating.set_relaxed(minimum);
    }

    fn remove_gating_sequence(&self, sequence: SequenceId) -> bool {
        self.gating_sequences.lock().remove(sequence)
    }

    fn minimum_gating_sequence(&self) -> u64 {
        self.gating_sequences.lock().get().min(self.cursor_value())
    }

    fn has_available_capacity(&self, required: usize) -> bool {
        let current = self.latest_claimed.get_relaxed();
        let wrap_point = (current + required as u64).saturating_sub(self.buffer_size as u64);
        let cached = self.cached_gating.get_relaxed();

        if wrap_point > cached || cached > current {
            return wrap_point <= self.refresh_gating(current);
        }
        true
    }

    fn remaining_capacity(&self) -> u64 {
        let produced = self.latest_claimed.get_relaxed();
        let consumed = self.gating_sequences.lock().get().min(produced);
        (self.buffer_size as u64).saturating_sub(produced - consumed)
    }

    fn new_barrier(self: Arc<Self>, dependencies: &[SequenceId]) -> ProcessingSequenceBarrier {
        barrier_for(self, dependencies)
    }
}

const FLAGS_PER_LINE: usize = 16;

/// Sixteen availability flags sharing one cache line
#[repr(align(64))]
struct FlagLine([AtomicU32; FLAGS_PER_LINE]);

impl FlagLine {
    fn new() -> Self {
        Self(std::array::from_fn(|_| AtomicU32::new(0)))
    }
}

/// Multi producer sequencer
///
/// Producers claim with a fetch-add on the cursor, so the cursor is the highest
/// *claimed* sequence. Publication is recorded per slot as the lap number
/// `sequence >> log2(buffer_size)`; readers must go through
/// [`get_highest_published_sequence`](Sequencer::get_highest_published_sequence)
/// to find the contiguous published prefix.
pub struct MultiProducerSequencer {
    buffer_size: usize,
    arena: Arc<SequenceArena>,
    cursor: SequenceId,
    wait_strategy: Arc<dyn WaitStrategy>,
    gating_sequences: RwLock<SharedSequenceGroup>,
    cached_gating: Sequence,
    available_buffer: Box<[FlagLine]>,
    index_mask: u64,
    index_shift: u32,
}

impl MultiProducerSequencer {
    /// Create a new multi producer sequencer
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if buffer_size is not a power of 2
    pub fn new(
        buffer_size: usize,
        arena: Arc<SequenceArena>,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self> {
        if !is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }
        let initial = initial_sequence_value(buffer_size);
        let cursor = arena.allocate(initial)?;

        // Lap 0 is never claimed: the first claim is `buffer_size + 1`, lap 1.
        let lines = buffer_size.div_ceil(FLAGS_PER_LINE);
        let available_buffer: Box<[FlagLine]> = (0..lines).map(|_| FlagLine::new()).collect();

        debug!(
            buffer_size,
            %cursor,
            wait_strategy = wait_strategy.name(),
            "created multi producer sequencer"
        );

        Ok(Self {
            buffer_size,
            gating_sequences: RwLock::new(SharedSequenceGroup::new(Arc::clone(&arena), &[])),
            arena,
            cursor,
            wait_strategy,
            cached_gating: Sequence::new(initial),
            available_buffer,
            index_mask: (buffer_size - 1) as u64,
            index_shift: buffer_size.trailing_zeros(),
        })
    }

    #[inline]
    fn cursor_sequence(&self) -> &Sequence {
        self.arena.get(self.cursor)
    }

    #[inline]
    fn flag(&self, sequence: u64) -> &AtomicU32 {
        let index = (sequence & self.index_mask) as usize;
        &self.available_buffer[index / FLAGS_PER_LINE].0[index % FLAGS_PER_LINE]
    }

    #[inline]
    fn availability_flag(&self, sequence: u64) -> u32 {
        (sequence >> self.index_shift) as u32
    }

    #[inline]
    fn set_available(&self, sequence: u64) {
        self.flag(sequence)
            .store(self.availability_flag(sequence), Ordering::Release);
    }

    fn has_capacity_from(&self, required: usize, cursor_value: u64) -> bool {
        let wrap_point = (cursor_value + required as u64).saturating_sub(self.buffer_size as u64);
        let cached = self.cached_gating.get();

        if wrap_point > cached || cached > cursor_value {
            let minimum = self.gating_sequences.read().get().min(cursor_value);
            self.cached_gating.set(minimum);
            if wrap_point > minimum {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Debug for MultiProducerSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiProducerSequencer")
            .field("buffer_size", &self.buffer_size)
            .field("cursor", &self.cursor_value())
            .field("gating_sequences", &self.gating_sequences.read().members())
            .field("wait_strategy", &self.wait_strategy.name())
            .finish()
    }
}

impl Sequencer for MultiProducerSequencer {
    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn cursor(&self) -> SequenceId {
        self.cursor
    }

    fn arena(&self) -> &Arc<SequenceArena> {
        &self.arena
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }

    fn claim(&self, sequence: u64) {
        self.cursor_sequence().set(sequence);
    }

    fn next_n(&self, n: usize) -> Result<u64> {
        validate_batch_size(n, self.buffer_size)?;

        let current = self.cursor_sequence().get_and_add(n as u64);
        let next_sequence = current + n as u64;
        let wrap_point = next_sequence.saturating_sub(self.buffer_size as u64);
        let cached = self.cached_gating.get();

        if wrap_point > cached || cached > current {
            let mut backoff = Backoff::new();
            loop {
                let minimum = self.gating_sequences.read().get().min(current);
                if wrap_point <= minimum {
                    self.cached_gating.set(minimum);
                    break;
                }
                backoff.snooze();
            }
        }

        Ok(next_sequence)
    }

    fn try_next_n(&self, n: usize) -> Result<u64> {
        validate_batch_size(n, self.buffer_size)?;

        let cursor = self.cursor_sequence();
        loop {
            let current = cursor.get();
            if !self.has_capacity_from(n, current) {
                return Err(DisruptorError::InsufficientCapacity);
            }
            let next_sequence = current + n as u64;
            if cursor.compare_and_set(current, next_sequence) {
                return Ok(next_sequence);
            }
        }
    }

    fn publish(&self, sequence: u64) {
        self.set_available(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, low: u64, high: u64) {
        for sequence in low..=high {
            self.set_available(sequence);
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: u64) -> bool {
        self.flag(sequence).load(Ordering::Acquire) == self.availability_flag(sequence)
    }

    fn get_highest_published_sequence(&self, next_sequence: u64, available_sequence: u64) -> u64 {
        for sequence in next_sequence..=available_sequence {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
        }
        available_sequence
    }

    fn add_gating_sequences(&self, gating_sequences: &[SequenceId]) {
        let mut group = self.gating_sequences.write();
        group.add(gating_sequences);
        self.cached_gating
            .set(group.get().min(self.cursor_sequence().get()));
    }

    fn remove_gating_sequence(&self, sequence: SequenceId) -> bool {
        self.gating_sequences.write().remove(sequence)
    }

    fn minimum_gating_sequence(&self) -> u64 {
        self.gating_sequences.read().get().min(self.cursor_value())
    }

    fn has_available_capacity(&self, required: usize) -> bool {
        self.has_capacity_from(required, self.cursor_value())
    }

    fn remaining_capacity(&self) -> u64 {
        let produced = self.cursor_value();
        let consumed = self.gating_sequences.read().get().min(produced);
        (self.buffer_size as u64).saturating_sub(produced - consumed)
    }

    fn new_barrier(self: Arc<Self>, dependencies: &[SequenceId]) -> ProcessingSequenceBarrier {
        barrier_for(self, dependencies)
    }
}
