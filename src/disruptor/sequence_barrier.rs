//! Sequence Barrier Implementation
//!
//! This module provides sequence barriers for coordinating dependencies between
//! event processors in the Disruptor pattern. Sequence barriers ensure that
//! consumers don't process events until their dependencies have been satisfied.

use crate::disruptor::{CachedSequenceGroup, DisruptorError, Sequencer, WaitStrategy};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marker returned when a wait is interrupted by an alert
///
/// This is control flow, not a failure: a processor that sees it exits its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, thiserror::Error)]
#[error("sequence barrier alerted")]
pub struct Alerted;

impl From<Alerted> for DisruptorError {
    fn from(_: Alerted) -> Self {
        DisruptorError::Alerted
    }
}

/// Cross-thread halt request flag
///
/// Raising the flag also wakes any consumer parked in the associated wait
/// strategy, so blocking waits notice the request promptly.
pub struct AlertFlag {
    raised: CachePadded<AtomicBool>,
    wait_strategy: Option<Arc<dyn WaitStrategy>>,
}

impl AlertFlag {
    /// A flag that wakes nobody when raised
    pub fn new() -> Self {
        Self {
            raised: CachePadded::new(AtomicBool::new(false)),
            wait_strategy: None,
        }
    }

    /// A flag that signals `wait_strategy` when raised
    pub fn signalling(wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            raised: CachePadded::new(AtomicBool::new(false)),
            wait_strategy: Some(wait_strategy),
        }
    }

    /// Raise the flag and wake blocked waiters
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        if let Some(wait_strategy) = &self.wait_strategy {
            wait_strategy.signal_all_when_blocking();
        }
    }

    /// Lower the flag
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// `Err(Alerted)` if the flag is raised
    #[inline]
    pub fn check(&self) -> std::result::Result<(), Alerted> {
        if self.is_raised() {
            Err(Alerted)
        } else {
            Ok(())
        }
    }
}

impl Default for AlertFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AlertFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertFlag")
            .field("raised", &self.is_raised())
            .finish()
    }
}

/// Coordination barrier for managing dependencies between event processors
///
/// `wait_for` takes `&mut self`: a barrier belongs to exactly one consumer. Other
/// threads interact with it only through the shared [`AlertFlag`].
pub trait SequenceBarrier: Send {
    /// Wait for the given sequence to become available
    ///
    /// # Returns
    /// The highest sequence the consumer may read. It may be higher than requested,
    /// or lower when the wait strategy gave up early; callers must handle both.
    ///
    /// # Errors
    /// Returns `Alerted` if the barrier has been alerted
    fn wait_for(&mut self, sequence: u64) -> std::result::Result<u64, Alerted>;

    /// Check if this barrier has been alerted
    fn is_alerted(&self) -> bool;

    /// Alert this barrier and wake any thread waiting on it
    fn alert(&self);

    /// Clear the current alert status
    fn clear_alert(&self);

    /// `Err(Alerted)` if this barrier has been alerted
    fn check_alert(&self) -> std::result::Result<(), Alerted>;

    /// The shared flag behind [`alert`](Self::alert), for halting from other threads
    fn alert_flag(&self) -> Arc<AlertFlag>;
}

/// Barrier over a sequencer's cursor or over upstream consumers
///
/// When the barrier listens to the producer cursor directly, the value resolved by
/// the wait strategy is narrowed to the highest *contiguous* published sequence,
/// which hides publish-order gaps left by concurrent producers. Upstream consumer
/// watermarks are contiguous already, so a gated barrier skips that scan.
pub struct ProcessingSequenceBarrier {
    direct_listener: bool,
    dependencies: CachedSequenceGroup,
    sequencer: Arc<dyn Sequencer>,
    wait_strategy: Arc<dyn WaitStrategy>,
    alert: Arc<AlertFlag>,
}

impl ProcessingSequenceBarrier {
    /// Create a new processing sequence barrier
    ///
    /// # Arguments
    /// * `direct_listener` - True if `dependencies` is the sequencer cursor itself
    /// * `dependencies` - The sequences this consumer must trail
    /// * `sequencer` - Answers the highest contiguous published sequence
    /// * `wait_strategy` - How to wait for `dependencies` to advance
    pub fn new(
        direct_listener: bool,
        dependencies: CachedSequenceGroup,
        sequencer: Arc<dyn Sequencer>,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Self {
        let alert = Arc::new(AlertFlag::signalling(Arc::clone(&wait_strategy)));
        Self {
            direct_listener,
            dependencies,
            sequencer,
            wait_strategy,
            alert,
        }
    }

    pub fn is_direct_listener(&self) -> bool {
        self.direct_listener
    }

    pub fn dependencies(&self) -> &CachedSequenceGroup {
        &self.dependencies
    }
}

impl std::fmt::Debug for ProcessingSequenceBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingSequenceBarrier")
            .field("direct_listener", &self.direct_listener)
            .field("dependencies", &self.dependencies.members())
            .field("wait_strategy", &self.wait_strategy.name())
            .field("alerted", &self.alert.is_raised())
            .finish()
    }
}

impl SequenceBarrier for ProcessingSequenceBarrier {
    fn wait_for(&mut self, sequence: u64) -> std::result::Result<u64, Alerted> {
        self.alert.check()?;

        let available = self
            .wait_strategy
            .wait_for(sequence, &mut self.dependencies, &self.alert)?;

        if available < sequence {
            return Ok(available);
        }

        if self.direct_listener {
            Ok(self
                .sequencer
                .get_highest_published_sequence(sequence, available))
        } else {
            Ok(available)
        }
    }

    fn is_alerted(&self) -> bool {
        self.alert.is_raised()
    }

    fn alert(&self) {
        self.alert.raise();
    }

    fn clear_alert(&self) {
        self.alert.clear();
    }

    fn check_alert(&self) -> std::result::Result<(), Alerted> {
        self.alert.check()
    }

    fn alert_flag(&self) -> Arc<AlertFlag> {
        Arc::clone(&self.alert)
    }
}
