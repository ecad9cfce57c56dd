//! End-to-end pipeline tests
//!
//! Single producer scenarios: a small ring that wraps several times, a
//! three-stage dependency chain, a fan-in stage, and retiring a chain's tail.

use seqring::{
    ClosureEventHandler, DefaultEventFactory, DisruptorConfig, EventHandler, Pipeline,
    ProducerType, SequenceArena, ThreadBuilder, WaitStrategyType,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct ValueEvent {
    value: u64,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {description}");
        thread::yield_now();
    }
}

/// Records every sequence it sees and the size of each batch
#[derive(Default)]
struct Recorder {
    sequences: Vec<u64>,
    batches: Vec<usize>,
    current_batch: usize,
}

impl EventHandler<ValueEvent> for Recorder {
    fn on_event(&mut self, event: &ValueEvent, sequence: u64, end_of_batch: bool) -> anyhow::Result<()> {
        anyhow::ensure!(
            event.value == sequence,
            "slot for {sequence} holds {}",
            event.value
        );
        self.sequences.push(sequence);
        self.current_batch += 1;
        if end_of_batch {
            self.batches.push(self.current_batch);
            self.current_batch = 0;
        }
        Ok(())
    }
}

#[test]
fn test_small_ring_drains_every_published_sequence() {
    init_tracing();
    let pipeline = Pipeline::new(
        4,
        ProducerType::Single,
        WaitStrategyType::Blocking,
        DefaultEventFactory::<ValueEvent>::new(),
        4,
    )
    .unwrap();
    assert_eq!(pipeline.cursor(), 4);

    let processor = pipeline.handle_events_with(Recorder::default()).unwrap();
    let consumer = processor.cursor_id();
    let halt = processor.halt_handle();
    let thread = ThreadBuilder::new()
        .thread_name("recorder")
        .spawn_processor(processor)
        .unwrap();

    let mut last = 0;
    while last < 10 {
        last = pipeline.publish_with(|event, sequence| event.value = sequence).unwrap();
    }
    assert_eq!(last, 10);

    wait_until("consumer to reach 10", || pipeline.arena().get(consumer).get() == 10);
    halt.halt();
    let (outcome, recorder) = thread.join().unwrap();
    outcome.unwrap();

    assert_eq!(recorder.sequences, (5..=10).collect::<Vec<_>>());
    assert_eq!(recorder.batches.iter().sum::<usize>(), 6);
    assert_eq!(pipeline.arena().get(consumer).get(), 10);
}

#[test]
fn test_dependency_chain_stages_trail_each_other() {
    init_tracing();
    const EVENTS: u64 = 2_000;

    let pipeline = Pipeline::new(
        16,
        ProducerType::Single,
        WaitStrategyType::Yield,
        DefaultEventFactory::<ValueEvent>::new(),
        8,
    )
    .unwrap();
    let arena: Arc<SequenceArena> = Arc::clone(pipeline.arena());

    let first = pipeline
        .handle_events_with(ClosureEventHandler::new(|event: &ValueEvent, sequence, _| {
            anyhow::ensure!(event.value == sequence * 2, "first stage saw a torn slot");
            Ok(())
        }))
        .unwrap();
    let first_id = first.cursor_id();

    let upstream = Arc::clone(&arena);
    let second = pipeline
        .handle_events_after(
            &[first_id],
            ClosureEventHandler::new(move |_: &ValueEvent, sequence, _| {
                anyhow::ensure!(
                    upstream.get(first_id).get() >= sequence,
                    "second stage overtook the first at {sequence}"
                );
                Ok(())
            }),
        )
        .unwrap();
    let second_id = second.cursor_id();

    let upstream = Arc::clone(&arena);
    let third = pipeline
        .handle_events_after(
            &[second_id],
            ClosureEventHandler::new(move |_: &ValueEvent, sequence, _| {
                anyhow::ensure!(
                    upstream.get(second_id).get() >= sequence,
                    "third stage overtook the second at {sequence}"
                );
                Ok(())
            }),
        )
        .unwrap();
    let third_id = third.cursor_id();

    let halts = [first.halt_handle(), second.halt_handle(), third.halt_handle()];
    let threads = (
        ThreadBuilder::new().spawn_processor(first).unwrap(),
        ThreadBuilder::new().spawn_processor(second).unwrap(),
        ThreadBuilder::new().spawn_processor(third).unwrap(),
    );

    let mut last = 0;
    for _ in 0..EVENTS {
        last = pipeline
            .publish_with(|event, sequence| event.value = sequence * 2)
            .unwrap();
    }
    assert_eq!(last, 16 + EVENTS);

    wait_until("tail of the chain to drain", || arena.get(third_id).get() == last);
    for halt in &halts {
        halt.halt();
    }
    // The three handlers have distinct closure types, so join them individually.
    let (outcome, _) = threads.0.join().unwrap();
    outcome.unwrap();
    let (outcome, _) = threads.1.join().unwrap();
    outcome.unwrap();
    let (outcome, _) = threads.2.join().unwrap();
    outcome.unwrap();
    assert_eq!(arena.get(first_id).get(), last);
    assert_eq!(arena.get(second_id).get(), last);
}

#[test]
fn test_handler_failure_stops_only_that_consumer() {
    init_tracing();
    let pipeline = Pipeline::new(
        8,
        ProducerType::Single,
        WaitStrategyType::BusySpin,
        DefaultEventFactory::<ValueEvent>::new(),
        4,
    )
    .unwrap();

    let processor = pipeline
        .handle_events_with(ClosureEventHandler::new(|event: &ValueEvent, _, _| {
            anyhow::ensure!(event.value != 3, "poisoned event");
            Ok(())
        }))
        .unwrap();
    let consumer = processor.cursor_id();
    let halt = processor.halt_handle();
    let thread = ThreadBuilder::new().spawn_processor(processor).unwrap();

    for value in 1..=4 {
        pipeline.publish_with(|event, _| event.value = value).unwrap();
    }

    let (outcome, _) = thread.join().unwrap();
    match outcome {
        Err(seqring::DisruptorError::EventHandler { sequence, source }) => {
            assert_eq!(sequence, 11);
            assert_eq!(source.to_string(), "poisoned event");
        }
        other => panic!("expected handler failure, got {other:?}"),
    }
    assert!(pipeline.arena().get(consumer).get() < 11);
    assert_eq!(halt.state(), seqring::ProcessorState::Halted);

    // The dead consumer still gates the ring until it is removed.
    assert!(pipeline.remove_gating(consumer));
    for value in 5..=20 {
        pipeline.publish_with(|event, _| event.value = value).unwrap();
    }
}

#[test]
fn test_pipeline_from_json_config() {
    init_tracing();
    let config = DisruptorConfig::from_json_str(
        r#"{ "buffer_size": 32, "producer_type": "single", "wait_strategy": "sleep", "sleep_nanos": 1000 }"#,
    )
    .unwrap();
    let pipeline = Pipeline::from_config(&config, DefaultEventFactory::<ValueEvent>::new()).unwrap();

    let processor = pipeline.handle_events_with(Recorder::default()).unwrap();
    let consumer = processor.cursor_id();
    let halt = processor.halt_handle();
    let thread = ThreadBuilder::new().spawn_processor(processor).unwrap();

    let last = pipeline
        .publish_batch_with(20, |event, sequence| event.value = sequence)
        .unwrap();
    wait_until("batch to drain", || pipeline.arena().get(consumer).get() == last);
    halt.halt();

    let (outcome, recorder) = thread.join().unwrap();
    outcome.unwrap();
    assert_eq!(recorder.sequences.len(), 20);
    assert_eq!(recorder.sequences.first(), Some(&33));
}

#[test]
fn test_fan_in_stage_waits_for_every_upstream() {
    init_tracing();
    const EVENTS: u64 = 1_000;

    let pipeline = Pipeline::new(
        8,
        ProducerType::Single,
        WaitStrategyType::Blocking,
        DefaultEventFactory::<ValueEvent>::new(),
        8,
    )
    .unwrap();
    let arena = Arc::clone(pipeline.arena());

    let left = pipeline.handle_events_with(Recorder::default()).unwrap();
    let right = pipeline.handle_events_with(Recorder::default()).unwrap();
    let upstream = [left.cursor_id(), right.cursor_id()];

    let watched = Arc::clone(&arena);
    let join = pipeline
        .handle_events_after(
            &upstream,
            ClosureEventHandler::new(move |event: &ValueEvent, sequence, _| {
                anyhow::ensure!(
                    watched.minimum(&upstream) >= sequence,
                    "join stage ran ahead of its inputs at {sequence}"
                );
                anyhow::ensure!(event.value == sequence, "torn slot at {sequence}");
                Ok(())
            }),
        )
        .unwrap();
    let join_id = join.cursor_id();

    let halts = [left.halt_handle(), right.halt_handle(), join.halt_handle()];
    let left = ThreadBuilder::new().thread_name("left").spawn_processor(left).unwrap();
    let right = ThreadBuilder::new().thread_name("right").spawn_processor(right).unwrap();
    let join = ThreadBuilder::new().thread_name("join").spawn_processor(join).unwrap();

    let mut last = 0;
    for _ in 0..EVENTS {
        last = pipeline.publish_with(|event, sequence| event.value = sequence).unwrap();
    }
    wait_until("join stage to drain", || arena.get(join_id).get() == last);

    for halt in &halts {
        halt.halt();
    }
    let (outcome, _) = join.join().unwrap();
    outcome.unwrap();
    for side in [left, right] {
        let (outcome, recorder) = side.join().unwrap();
        outcome.unwrap();
        assert_eq!(recorder.sequences.len() as u64, EVENTS);
    }
}

#[test]
fn test_tearing_down_chain_tail_keeps_upstream_protected() {
    init_tracing();
    let pipeline = Pipeline::new(
        8,
        ProducerType::Single,
        WaitStrategyType::Yield,
        DefaultEventFactory::<ValueEvent>::new(),
        4,
    )
    .unwrap();

    let first = pipeline.handle_events_with(Recorder::default()).unwrap();
    let first_id = first.cursor_id();
    let second = pipeline
        .handle_events_after(&[first_id], Recorder::default())
        .unwrap();
    let second_id = second.cursor_id();

    let first_halt = first.halt_handle();
    let second_halt = second.halt_handle();
    let first_thread = ThreadBuilder::new().spawn_processor(first).unwrap();
    let second_thread = ThreadBuilder::new().spawn_processor(second).unwrap();

    let mut last = 0;
    for _ in 0..20 {
        last = pipeline.publish_with(|event, sequence| event.value = sequence).unwrap();
    }
    wait_until("tail to drain", || pipeline.arena().get(second_id).get() == last);

    // Retire the tail; the first stage keeps running and stays protected.
    second_halt.halt();
    let (outcome, _) = second_thread.join().unwrap();
    outcome.unwrap();
    assert!(pipeline.remove_gating(second_id));

    for _ in 0..50 {
        last = pipeline.publish_with(|event, sequence| event.value = sequence).unwrap();
    }
    wait_until("first stage to drain", || pipeline.arena().get(first_id).get() == last);
    first_halt.halt();
    let (outcome, recorder) = first_thread.join().unwrap();
    outcome.unwrap();
    assert_eq!(recorder.sequences, (9..=last).collect::<Vec<_>>());

    // With the first stage stopped, producers fill one lap and no more.
    let parked = pipeline.arena().get(first_id).get();
    let mut published = pipeline.cursor();
    while let Ok(sequence) = pipeline.try_publish_with(|event, sequence| event.value = sequence) {
        published = sequence;
    }
    assert_eq!(published, parked + 8);
}
