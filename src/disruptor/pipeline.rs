//! Pipeline builder
//!
//! A [`Pipeline`] owns the sequence arena, the ring buffer and the sequencer, and
//! wires consumers onto them. Each `handle_events_*` call returns a
//! [`BatchEventProcessor`] ready to be run on a thread of the caller's choosing
//! (see [`ThreadBuilder`](crate::disruptor::ThreadBuilder)).
//!
//! ```
//! use seqring::{DefaultEventFactory, Pipeline, ProducerType, WaitStrategyType, ClosureEventHandler};
//!
//! #[derive(Default)]
//! struct Tick {
//!     price: u64,
//! }
//!
//! let pipeline = Pipeline::new(
//!     64,
//!     ProducerType::Single,
//!     WaitStrategyType::Yield,
//!     DefaultEventFactory::<Tick>::new(),
//!     8,
//! )
//! .unwrap();
//!
//! let mut processor = pipeline
//!     .handle_events_with(ClosureEventHandler::new(|tick: &Tick, _, _| {
//!         assert!(tick.price > 0);
//!         Ok(())
//!     }))
//!     .unwrap();
//! let halt = processor.halt_handle();
//! let consumer = std::thread::spawn(move || processor.run());
//!
//! let last = pipeline.publish_with(|tick, sequence| tick.price = sequence).unwrap();
//! while pipeline.sequencer().minimum_gating_sequence() < last {
//!     std::thread::yield_now();
//! }
//! halt.halt();
//! consumer.join().unwrap().unwrap();
//! ```

use crate::disruptor::{
    create_sequencer, BatchEventProcessor, DisruptorConfig, EventFactory, EventHandler,
    ProcessingSequenceBarrier, ProducerType, Result, RingBuffer, SequenceArena, SequenceId,
    Sequencer, WaitStrategy, WaitStrategyType,
};
use std::sync::Arc;
use tracing::debug;

/// Processor type produced by [`Pipeline`]
pub type PipelineProcessor<T, H> = BatchEventProcessor<T, ProcessingSequenceBarrier, H>;

/// Arena, ring buffer and sequencer of one disruptor, plus consumer wiring
///
/// Cloning is cheap and yields another handle onto the same ring, which is how
/// several producer threads share a multi-producer pipeline.
pub struct Pipeline<T> {
    arena: Arc<SequenceArena>,
    ring_buffer: Arc<RingBuffer<T>>,
    sequencer: Arc<dyn Sequencer>,
}

impl<T> Pipeline<T> {
    /// Create a pipeline with a built-in wait strategy
    ///
    /// # Arguments
    /// * `buffer_size` - Number of ring slots, a power of two
    /// * `producer_type` - Single or multiple producer threads
    /// * `wait_strategy_type` - How consumers wait
    /// * `event_factory` - Fills every slot up front
    /// * `arena_capacity` - Room for the cursor plus one sequence per consumer
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` for a bad `buffer_size`, or
    /// `DisruptorError::ArenaExhausted` if `arena_capacity` is zero
    pub fn new<F>(
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy_type: WaitStrategyType,
        event_factory: F,
        arena_capacity: usize,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        Self::with_wait_strategy(
            buffer_size,
            producer_type,
            wait_strategy_type.create(),
            event_factory,
            arena_capacity,
        )
    }

    /// Create a pipeline from a validated configuration
    pub fn from_config<F>(config: &DisruptorConfig, event_factory: F) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        config.validate()?;
        Self::with_wait_strategy(
            config.buffer_size,
            config.producer_type,
            config.wait_strategy(),
            event_factory,
            config.arena_capacity,
        )
    }

    /// Create a pipeline with a caller-supplied wait strategy
    pub fn with_wait_strategy<F>(
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
        event_factory: F,
        arena_capacity: usize,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        let ring_buffer = Arc::new(RingBuffer::new(buffer_size, event_factory)?);
        let arena = Arc::new(SequenceArena::with_capacity(arena_capacity));
        let sequencer = create_sequencer(
            producer_type,
            buffer_size,
            Arc::clone(&arena),
            wait_strategy,
        )?;

        debug!(
            buffer_size,
            %producer_type,
            arena_capacity,
            wait_strategy = sequencer.wait_strategy().name(),
            "pipeline created"
        );

        Ok(Self {
            arena,
            ring_buffer,
            sequencer,
        })
    }

    /// Add a consumer that reads straight behind the producers
    ///
    /// A consumer added while events are flowing starts at the current producer
    /// cursor; earlier events are never delivered to it.
    ///
    /// # Errors
    /// Returns `DisruptorError::ArenaExhausted` if the arena has no room for the
    /// consumer's sequence
    pub fn handle_events_with<H>(&self, handler: H) -> Result<PipelineProcessor<T, H>>
    where
        H: EventHandler<T>,
    {
        self.handle_events_after(&[], handler)
    }

    /// Add a consumer that only sees events every `upstream` consumer has handled
    ///
    /// The new consumer starts at the slowest upstream watermark and joins the
    /// producers' gating set. Upstream consumers keep gating too, so removing a
    /// stage never exposes the stages in front of it.
    pub fn handle_events_after<H>(
        &self,
        upstream: &[SequenceId],
        handler: H,
    ) -> Result<PipelineProcessor<T, H>>
    where
        H: EventHandler<T>,
    {
        let barrier = Arc::clone(&self.sequencer).new_barrier(upstream);
        let processor = BatchEventProcessor::new(
            Arc::clone(&self.arena),
            Arc::clone(&self.ring_buffer),
            barrier,
            handler,
        )?;

        // Set the start before gating, then again after: producers may have
        // moved on in between, but cannot pass the gate once it is in place.
        let watermark = processor.get_cursor();
        watermark.set(self.start_position(upstream));
        self.sequencer.add_gating_sequences(&[processor.cursor_id()]);
        watermark.set(self.start_position(upstream));

        debug!(
            consumer = %processor.cursor_id(),
            upstream = ?upstream,
            start = watermark.get(),
            "consumer added to pipeline"
        );
        Ok(processor)
    }

    fn start_position(&self, upstream: &[SequenceId]) -> u64 {
        if upstream.is_empty() {
            self.sequencer.cursor_value()
        } else {
            self.arena.minimum(upstream)
        }
    }

    /// Stop gating the producers on `sequence`, e.g. once its consumer has halted
    ///
    /// # Returns
    /// True if the sequence was gating
    pub fn remove_gating(&self, sequence: SequenceId) -> bool {
        let removed = self.sequencer.remove_gating_sequence(sequence);
        if removed {
            debug!(consumer = %sequence, "consumer removed from gating");
        }
        removed
    }

    /// Claim one slot, fill it and publish it
    pub fn publish_with<F>(&self, translator: F) -> Result<u64>
    where
        F: FnOnce(&mut T, u64),
    {
        self.ring_buffer
            .publish_with(self.sequencer.as_ref(), translator)
    }

    /// Like [`publish_with`](Self::publish_with), failing instead of waiting for capacity
    pub fn try_publish_with<F>(&self, translator: F) -> Result<u64>
    where
        F: FnOnce(&mut T, u64),
    {
        self.ring_buffer
            .try_publish_with(self.sequencer.as_ref(), translator)
    }

    /// Claim, fill and publish `n` consecutive slots
    pub fn publish_batch_with<F>(&self, n: usize, translator: F) -> Result<u64>
    where
        F: FnMut(&mut T, u64),
    {
        self.ring_buffer
            .publish_batch_with(self.sequencer.as_ref(), n, translator)
    }

    pub fn arena(&self) -> &Arc<SequenceArena> {
        &self.arena
    }

    pub fn ring_buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.ring_buffer
    }

    pub fn sequencer(&self) -> &Arc<dyn Sequencer> {
        &self.sequencer
    }

    pub fn buffer_size(&self) -> usize {
        self.ring_buffer.buffer_size()
    }

    /// Current producer cursor
    pub fn cursor(&self) -> u64 {
        self.sequencer.cursor_value()
    }
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            arena: Arc::clone(&self.arena),
            ring_buffer: Arc::clone(&self.ring_buffer),
            sequencer: Arc::clone(&self.sequencer),
        }
    }
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sequencer", &self.sequencer)
            .field("arena", &self.arena)
            .finish()
    }
}
