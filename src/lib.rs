//! `SeqRing` - Lock-free sequencing core
//!
//! A Rust implementation of the LMAX Disruptor coordination core: a pre-allocated
//! ring of events, producers that claim and publish sequence numbers, and consumers
//! that wait on barriers and process events in batches.
//!
//! ## Features
//!
//! - **Lock-free claiming**: single producer claims are plain stores, multi producer
//!   claims are one fetch-add
//! - **Zero-allocation**: every event is created up front by an [`EventFactory`]
//! - **Dependency graphs**: consumers can gate on the producers or on other consumers
//! - **Pluggable waiting**: busy-spin, yield, sleep, adaptive and blocking strategies
//!
//! ## Quick Start
//!
//! ```rust
//! use seqring::{
//!     DefaultEventFactory, EventHandler, Pipeline, ProducerType, ThreadBuilder,
//!     WaitStrategyType,
//! };
//!
//! #[derive(Debug, Default)]
//! struct MyEvent {
//!     value: u64,
//! }
//!
//! #[derive(Default)]
//! struct Summer {
//!     total: u64,
//! }
//!
//! impl EventHandler<MyEvent> for Summer {
//!     fn on_event(&mut self, event: &MyEvent, _sequence: u64, _end_of_batch: bool) -> anyhow::Result<()> {
//!         self.total += event.value;
//!         Ok(())
//!     }
//! }
//!
//! let pipeline = Pipeline::new(
//!     1024,
//!     ProducerType::Single,
//!     WaitStrategyType::Blocking,
//!     DefaultEventFactory::<MyEvent>::new(),
//!     8,
//! )
//! .unwrap();
//!
//! let processor = pipeline.handle_events_with(Summer::default()).unwrap();
//! let halt = processor.halt_handle();
//! let cursor_id = processor.cursor_id();
//! let thread = ThreadBuilder::new()
//!     .thread_name("summer")
//!     .spawn_processor(processor)
//!     .unwrap();
//!
//! let mut last = 0;
//! for value in 1..=10 {
//!     last = pipeline.publish_with(|event, _| event.value = value).unwrap();
//! }
//! while pipeline.arena().get(cursor_id).get() < last {
//!     std::thread::yield_now();
//! }
//!
//! halt.halt();
//! let (outcome, summer) = thread.join().unwrap();
//! outcome.unwrap();
//! assert_eq!(summer.total, 55);
//! ```
//!
//! ## Architecture
//!
//! - **`RingBuffer`**: pre-allocated circular array of events
//! - **`Sequence`**: padded atomic progress counter, stored in a `SequenceArena`
//! - **`Sequencer`**: claims and publishes slots (single or multi producer)
//! - **`SequenceBarrier`**: tells a consumer how far it may read
//! - **`WaitStrategy`**: how a consumer waits when nothing is available
//! - **`BatchEventProcessor`**: runs an `EventHandler` loop over a barrier
//! - **`Pipeline`**: wires the pieces above together

pub mod disruptor;

pub use disruptor::{
    create_sequencer,
    event_factory,
    initial_sequence_value,
    is_power_of_two,
    AdaptiveWaitStrategy,
    AlertFlag,
    Alerted,
    BatchEventProcessor,
    BlockingWaitStrategy,
    BusySpinWaitStrategy,
    ClosureEventFactory,
    ClosureEventHandler,
    DefaultEventFactory,
    DisruptorConfig,
    DisruptorError,
    EventFactory,
    EventHandler,
    HaltHandle,
    ManagedThread,
    MultiProducerSequencer,
    NoOpEventHandler,
    Pipeline,
    ProcessingSequenceBarrier,
    ProcessorState,
    ProducerType,
    Result,
    RingBuffer,
    Sequence,
    SequenceArena,
    SequenceBarrier,
    SequenceId,
    Sequencer,
    SingleProducerSequencer,
    SleepingWaitStrategy,
    ThreadBuilder,
    WaitStrategy,
    WaitStrategyType,
    YieldingWaitStrategy,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `SeqRing` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
