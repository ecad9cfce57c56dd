//! Sequencing core
//!
//! Pre-allocated ring buffer, single and multi producer sequencers, consumer
//! barriers with pluggable wait strategies, and the batch event processor that
//! drives an [`EventHandler`] over published events.

pub mod config;
pub mod event_factory;
pub mod event_handler;
pub mod event_processor;
pub mod pipeline;
pub mod producer_type;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_arena;
pub mod sequence_barrier;
pub mod sequence_group;
pub mod sequencer;
pub mod thread_management;
pub mod wait_strategy;


pub use config::DisruptorConfig;
pub use event_factory::{event_factory, ClosureEventFactory, DefaultEventFactory, EventFactory};
pub use event_handler::{ClosureEventHandler, EventHandler, NoOpEventHandler};
pub use event_processor::{BatchEventProcessor, HaltHandle, ProcessorState};
pub use pipeline::{Pipeline, PipelineProcessor};
pub use producer_type::ProducerType;
pub use ring_buffer::RingBuffer;
pub use sequence::{initial_sequence_value, Sequence};
pub use sequence_arena::{SequenceArena, SequenceId};
pub use sequence_barrier::{AlertFlag, Alerted, ProcessingSequenceBarrier, SequenceBarrier};
pub use sequence_group::{CachedSequenceGroup, SharedSequenceGroup};
pub use sequencer::{create_sequencer, MultiProducerSequencer, Sequencer, SingleProducerSequencer};
pub use thread_management::{get_available_cores, ManagedThread, ThreadBuilder, ThreadContext};
pub use wait_strategy::{
    AdaptiveWaitStrategy, Backoff, BlockingWaitStrategy, BusySpinWaitStrategy,
    SleepingWaitStrategy, WaitStrategy, WaitStrategyType, YieldingWaitStrategy,
};

/// Errors that can occur in the Disruptor
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    #[error("Buffer size must be a power of 2, got: {0}")]
    InvalidBufferSize(usize),

    #[error("Batch size {requested} must be between 1 and the buffer size {buffer_size}")]
    InvalidBatchSize { requested: usize, buffer_size: usize },

    #[error("Insufficient capacity in ring buffer")]
    InsufficientCapacity,

    #[error("Sequence barrier alerted")]
    Alerted,

    #[error("Sequence arena exhausted, capacity is {capacity}")]
    ArenaExhausted { capacity: usize },

    #[error("Event processor has already been started")]
    ProcessorAlreadyStarted,

    #[error("Single producer sequencer claimed from a thread other than its owner")]
    ProducerThreadMismatch,

    #[error("Event handler failed at sequence {sequence}")]
    EventHandler {
        sequence: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility function to check if a number is a power of 2
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
