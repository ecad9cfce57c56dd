//! Sequence arena
//!
//! Every progress counter in a pipeline (producer cursor, consumer watermarks,
//! cached gating minima) lives in one fixed-capacity arena. Components refer to
//! sequences through [`SequenceId`] handles and keep an `Arc<SequenceArena>` next
//! to them, so the arena always outlives the handles that point into it.

use crate::disruptor::{DisruptorError, Result, Sequence};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stable handle to a [`Sequence`] stored in a [`SequenceArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(usize);

impl SequenceId {
    /// Position of the sequence inside its arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seq#{}", self.0)
    }
}

/// Fixed-capacity store of sequences addressed by [`SequenceId`]
///
/// Slots are pre-allocated at construction, so handing out a handle never
/// moves existing sequences.
pub struct SequenceArena {
    slots: Box<[Sequence]>,
    allocated: AtomicUsize,
}

impl SequenceArena {
    /// Create an arena able to hold `capacity` sequences
    pub fn with_capacity(capacity: usize) -> Self {
        let slots: Box<[Sequence]> = (0..capacity).map(|_| Sequence::default()).collect();
        Self {
            slots,
            allocated: AtomicUsize::new(0),
        }
    }

    /// Reserve a fresh sequence set to `initial_value`
    ///
    /// # Errors
    /// Returns `DisruptorError::ArenaExhausted` once every slot is in use
    pub fn allocate(&self, initial_value: u64) -> Result<SequenceId> {
        let capacity = self.slots.len();
        let index = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| DisruptorError::ArenaExhausted { capacity })?;

        self.slots[index].set(initial_value);
        Ok(SequenceId(index))
    }

    /// Resolve a handle
    ///
    /// # Panics
    /// Panics if `id` was issued by a different arena with more slots
    #[inline]
    pub fn get(&self, id: SequenceId) -> &Sequence {
        &self.slots[id.0]
    }

    /// Minimum of the given sequences, `u64::MAX` when `ids` is empty
    pub fn minimum(&self, ids: &[SequenceId]) -> u64 {
        ids.iter()
            .map(|id| self.get(*id).get())
            .min()
            .unwrap_or(u64::MAX)
    }

    /// Number of sequences handed out so far
    pub fn len(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// True if no sequence has been allocated yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for SequenceArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let live = &self.slots[..self.len()];
        f.debug_struct("SequenceArena")
            .field("capacity", &self.capacity())
            .field("sequences", &live)
            .finish()
    }
}
