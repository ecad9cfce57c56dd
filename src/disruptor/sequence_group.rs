//! Sequence groups
//!
//! A group is a read-only view over several dependency sequences that reports
//! their minimum. Two flavours exist:
//!
//! - [`SharedSequenceGroup`] scans every member on each read and may be read from
//!   any number of threads at once.
//! - [`CachedSequenceGroup`] remembers which member held the minimum last time and
//!   revalidates that single member before paying for a full rescan. Reads take
//!   `&mut self`, so only one thread can ever drive it.

use crate::disruptor::{SequenceArena, SequenceId};
use std::sync::Arc;

/// Minimum over a set of sequences, safe to read from many threads
#[derive(Debug, Clone)]
pub struct SharedSequenceGroup {
    arena: Arc<SequenceArena>,
    members: Vec<SequenceId>,
}

impl SharedSequenceGroup {
    /// Create a group over `members`
    pub fn new(arena: Arc<SequenceArena>, members: &[SequenceId]) -> Self {
        Self {
            arena,
            members: members.to_vec(),
        }
    }

    /// Current minimum, `u64::MAX` when the group is empty
    pub fn get(&self) -> u64 {
        self.arena.minimum(&self.members)
    }

    /// Add members to the group
    pub fn add(&mut self, ids: &[SequenceId]) {
        self.members.extend_from_slice(ids);
    }

    /// Remove a member
    ///
    /// # Returns
    /// True if the member was present
    pub fn remove(&mut self, id: SequenceId) -> bool {
        match self.members.iter().position(|m| *m == id) {
            Some(pos) => {
                self.members.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn members(&self) -> &[SequenceId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Minimum over a set of sequences with an (index, value) cache for a single reader
///
/// The reported value never exceeds the true minimum at the time of the last
/// rescan; [`cached`](Self::cached) may be stale but is always a lower bound
/// because sequences only move forward.
#[derive(Debug)]
pub struct CachedSequenceGroup {
    arena: Arc<SequenceArena>,
    members: Vec<SequenceId>,
    cached_value: u64,
    cached_index: usize,
}

impl CachedSequenceGroup {
    /// Create a group over `members` and prime the cache
    pub fn new(arena: Arc<SequenceArena>, members: &[SequenceId]) -> Self {
        let mut group = Self {
            arena,
            members: members.to_vec(),
            cached_value: u64::MAX,
            cached_index: 0,
        };
        group.rescan();
        group
    }

    /// Current minimum, `u64::MAX` when the group is empty
    pub fn get(&mut self) -> u64 {
        match self.members.len() {
            0 => u64::MAX,
            1 => {
                self.cached_value = self.arena.get(self.members[0]).get();
                self.cached_value
            }
            _ => self.get_with_cache(),
        }
    }

    /// Last value computed by [`get`](Self::get), without touching shared memory
    #[inline]
    pub fn cached(&self) -> u64 {
        self.cached_value
    }

    /// Add members and recompute the cache
    pub fn add(&mut self, ids: &[SequenceId]) {
        self.members.extend_from_slice(ids);
        self.rescan();
    }

    /// Remove a member and recompute the cache
    pub fn remove(&mut self, id: SequenceId) -> bool {
        match self.members.iter().position(|m| *m == id) {
            Some(pos) => {
                self.members.remove(pos);
                self.rescan();
                true
            }
            None => false,
        }
    }

    pub fn members(&self) -> &[SequenceId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn get_with_cache(&mut self) -> u64 {
        // The member that held the minimum has not moved: the minimum is unchanged.
        let holder = self.arena.get(self.members[self.cached_index]).get();
        if holder == self.cached_value {
            return self.cached_value;
        }

        let mut minimum = u64::MAX;
        let mut minimum_index = 0;
        for (index, id) in self.members.iter().enumerate() {
            let value = self.arena.get(*id).get();
            if value == self.cached_value {
                self.cached_index = index;
                return self.cached_value;
            }
            if value < minimum {
                minimum = value;
                minimum_index = index;
            }
        }

        self.cached_value = minimum;
        self.cached_index = minimum_index;
        minimum
    }

    fn rescan(&mut self) {
        let mut minimum = u64::MAX;
        let mut minimum_index = 0;
        for (index, id) in self.members.iter().enumerate() {
            let value = self.arena.get(*id).get();
            if value < minimum {
                minimum = value;
                minimum_index = index;
            }
        }
        self.cached_value = minimum;
        self.cached_index = minimum_index;
    }
}
