//! Event Processor implementation for the Disruptor
//!
//! Event processors handle the consumption of events from the ring buffer.
//! They coordinate with sequence barriers to ensure proper ordering and
//! drain everything the barrier reports as available in one batch.

use crate::disruptor::{
    initial_sequence_value, AlertFlag, Alerted, Backoff, DisruptorError, EventHandler, Result,
    RingBuffer, Sequence, SequenceArena, SequenceBarrier, SequenceId,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Lifecycle of a [`BatchEventProcessor`]
///
/// Transitions are one-way: `Idle -> Running -> Halted`, or `Idle -> Halted` when
/// halted before it ever ran. A halted processor is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    Idle = 0,
    Running = 1,
    Halted = 2,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Idle,
            1 => ProcessorState::Running,
            _ => ProcessorState::Halted,
        }
    }
}

/// Stops a processor from any thread
///
/// Obtained from [`BatchEventProcessor::halt_handle`] before the processor is moved
/// onto its thread.
#[derive(Debug, Clone)]
pub struct HaltHandle {
    alert: Arc<AlertFlag>,
    state: Arc<AtomicU8>,
}

impl HaltHandle {
    /// Request the processor loop to exit
    ///
    /// Returns immediately; the loop exits at its next barrier check.
    pub fn halt(&self) {
        let _ = self.state.compare_exchange(
            ProcessorState::Idle as u8,
            ProcessorState::Halted as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.alert.raise();
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }
}

/// Batch event processor
///
/// Waits on its barrier for the next sequence, hands every available event to the
/// handler in order, then publishes its own progress with one release store per
/// batch. Downstream consumers and producers gate on that progress through
/// [`cursor_id`](Self::cursor_id).
///
/// # Type Parameters
/// * `T` - The event type
/// * `B` - The barrier this processor waits on
/// * `H` - The event handler
pub struct BatchEventProcessor<T, B, H>
where
    B: SequenceBarrier,
    H: EventHandler<T>,
{
    arena: Arc<SequenceArena>,
    cursor: SequenceId,
    ring_buffer: Arc<RingBuffer<T>>,
    barrier: B,
    handler: H,
    state: Arc<AtomicU8>,
    ran: bool,
}

impl<T, B, H> BatchEventProcessor<T, B, H>
where
    B: SequenceBarrier,
    H: EventHandler<T>,
{
    /// Create a new batch event processor
    ///
    /// The processor's cursor is allocated in `arena` at the initial sequence value
    /// for the ring's size.
    ///
    /// # Errors
    /// Returns `DisruptorError::ArenaExhausted` if the arena is full
    pub fn new(
        arena: Arc<SequenceArena>,
        ring_buffer: Arc<RingBuffer<T>>,
        barrier: B,
        handler: H,
    ) -> Result<Self> {
        let cursor = arena.allocate(initial_sequence_value(ring_buffer.buffer_size()))?;
        Ok(Self {
            arena,
            cursor,
            ring_buffer,
            barrier,
            handler,
            state: Arc::new(AtomicU8::new(ProcessorState::Idle as u8)),
            ran: false,
        })
    }

    /// This processor's watermark: the highest sequence fully handled
    pub fn get_cursor(&self) -> &Sequence {
        self.arena.get(self.cursor)
    }

    /// Handle of the watermark, for gating producers and downstream barriers
    pub fn cursor_id(&self) -> SequenceId {
        self.cursor
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    /// A cloneable handle that halts this processor from another thread
    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle {
            alert: self.barrier.alert_flag(),
            state: Arc::clone(&self.state),
        }
    }

    /// Request the processor loop to exit
    pub fn halt(&self) {
        self.halt_handle().halt();
    }

    /// Borrow the handler, e.g. to inspect results after `run` returns
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Consume the processor and return its handler
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Run the processing loop on the current thread until halted
    ///
    /// # Errors
    /// Returns `DisruptorError::ProcessorAlreadyStarted` if the processor already ran,
    /// or `DisruptorError::EventHandler` if the handler failed. In the latter case the
    /// cursor stays at the last fully handled batch.
    pub fn run(&mut self) -> Result<()> {
        if self.ran {
            return Err(DisruptorError::ProcessorAlreadyStarted);
        }
        self.ran = true;

        self.barrier.clear_alert();
        if self
            .state
            .compare_exchange(
                ProcessorState::Idle as u8,
                ProcessorState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!(cursor = %self.cursor, "processor halted before it started");
            return Ok(());
        }

        info!(cursor = %self.cursor, "batch event processor started");
        self.handler.on_start();
        let result = self.process_events();
        self.handler.on_shutdown();
        self.state
            .store(ProcessorState::Halted as u8, Ordering::Release);

        if result.is_ok() {
            info!(
                cursor = %self.cursor,
                sequence = self.get_cursor().get(),
                "batch event processor halted"
            );
        }
        result
    }

    fn process_events(&mut self) -> Result<()> {
        let cursor = self.arena.get(self.cursor);
        let mut next_sequence = cursor.get() + 1;
        let mut backoff = Backoff::new();

        loop {
            let available_sequence = match self.barrier.wait_for(next_sequence) {
                Ok(sequence) => sequence,
                Err(Alerted) => return Ok(()),
            };

            // A multi-producer claim ahead of us has not been published yet.
            if available_sequence < next_sequence {
                backoff.snooze();
                continue;
            }
            backoff.reset();

            for sequence in next_sequence..=available_sequence {
                // SAFETY: the barrier certified [next_sequence, available_sequence] as
                // published, and producers cannot reclaim these slots until our
                // cursor moves past them.
                let event = unsafe { self.ring_buffer.get(sequence) };
                if let Err(source) =
                    self.handler
                        .on_event(event, sequence, sequence == available_sequence)
                {
                    error!(sequence, error = %source, "event handler failed, stopping processor");
                    return Err(DisruptorError::EventHandler { sequence, source });
                }
            }

            trace!(from = next_sequence, to = available_sequence, "batch handled");
            cursor.set(available_sequence);
            next_sequence = available_sequence + 1;
        }
    }
}

impl<T, B, H> std::fmt::Debug for BatchEventProcessor<T, B, H>
where
    B: SequenceBarrier,
    H: EventHandler<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEventProcessor")
            .field("cursor", &self.cursor)
            .field("sequence", &self.get_cursor().get())
            .field("state", &self.state())
            .finish()
    }
}
