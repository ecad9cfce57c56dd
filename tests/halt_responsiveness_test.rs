//! Halt latency per wait strategy
//!
//! An idle consumer parked in its wait strategy must leave the loop promptly
//! once halted, whichever strategy it waits with.

use seqring::{
    DefaultEventFactory, NoOpEventHandler, Pipeline, ProcessorState, ProducerType, ThreadBuilder,
    WaitStrategyType,
};
use std::thread;
use std::time::{Duration, Instant};

const HALT_BUDGET: Duration = Duration::from_millis(500);

fn halt_latency(strategy: WaitStrategyType, producer_type: ProducerType) -> Duration {
    let pipeline = Pipeline::new(
        16,
        producer_type,
        strategy,
        DefaultEventFactory::<u64>::new(),
        4,
    )
    .unwrap();
    let processor = pipeline.handle_events_with(NoOpEventHandler::new()).unwrap();
    let halt = processor.halt_handle();
    let thread = ThreadBuilder::new()
        .thread_name(format!("halt-{strategy}"))
        .spawn_processor(processor)
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !halt.is_running() {
        assert!(Instant::now() < deadline, "{strategy} processor never started");
        thread::yield_now();
    }
    // Let the consumer settle into its idle wait.
    thread::sleep(Duration::from_millis(20));

    let halted_at = Instant::now();
    halt.halt();
    let (outcome, _) = thread.join().unwrap();
    let elapsed = halted_at.elapsed();

    outcome.unwrap();
    assert_eq!(halt.state(), ProcessorState::Halted);
    elapsed
}

#[test]
fn test_every_strategy_halts_promptly() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    for strategy in WaitStrategyType::ALL {
        for producer_type in [ProducerType::Single, ProducerType::Multi] {
            let elapsed = halt_latency(strategy, producer_type);
            assert!(
                elapsed < HALT_BUDGET,
                "{strategy}/{producer_type} took {elapsed:?} to halt"
            );
        }
    }
}

#[test]
fn test_halt_before_start_skips_the_loop() {
    let pipeline = Pipeline::new(
        8,
        ProducerType::Single,
        WaitStrategyType::Blocking,
        DefaultEventFactory::<u64>::new(),
        4,
    )
    .unwrap();
    let processor = pipeline.handle_events_with(NoOpEventHandler::new()).unwrap();
    let halt = processor.halt_handle();
    halt.halt();
    assert_eq!(halt.state(), ProcessorState::Halted);

    let thread = ThreadBuilder::new().spawn_processor(processor).unwrap();
    let (outcome, _) = thread.join().unwrap();
    outcome.unwrap();
    assert_eq!(halt.state(), ProcessorState::Halted);
}
