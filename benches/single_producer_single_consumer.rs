//! Single Producer Single Consumer (SPSC) Benchmarks
//!
//! Bursts of events from one producer to one consumer, once per wait strategy,
//! against a baseline that hands values over through a bare atomic.

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use seqring::{
    DefaultEventFactory, EventHandler, Pipeline, ProducerType, ThreadBuilder, WaitStrategyType,
};

const BUFFER_SIZE: usize = 1024;
const BURST_SIZES: [u64; 3] = [1, 100, 1000];

#[derive(Debug, Default, Clone, Copy)]
struct BenchmarkEvent {
    value: u64,
}

/// Stores the last value seen so the work cannot be optimised away
struct Sink {
    last: Arc<AtomicU64>,
}

impl EventHandler<BenchmarkEvent> for Sink {
    fn on_event(&mut self, event: &BenchmarkEvent, _sequence: u64, _end_of_batch: bool) -> anyhow::Result<()> {
        self.last.store(event.value, Ordering::Relaxed);
        Ok(())
    }
}

fn baseline(group: &mut BenchmarkGroup<WallTime>, burst_size: u64) {
    let sink = Arc::new(AtomicU64::new(0));
    group.throughput(Throughput::Elements(burst_size));
    group.bench_function(BenchmarkId::new("baseline", burst_size), |b| {
        b.iter(|| {
            for i in 1..=burst_size {
                sink.store(black_box(i), Ordering::Release);
            }
            while sink.load(Ordering::Acquire) != burst_size {}
        })
    });
}

fn pipeline_burst(group: &mut BenchmarkGroup<WallTime>, strategy: WaitStrategyType, burst_size: u64) {
    let pipeline = Pipeline::new(
        BUFFER_SIZE,
        ProducerType::Single,
        strategy,
        DefaultEventFactory::<BenchmarkEvent>::new(),
        4,
    )
    .unwrap();
    let processor = pipeline
        .handle_events_with(Sink {
            last: Arc::new(AtomicU64::new(0)),
        })
        .unwrap();
    let consumer = processor.cursor_id();
    let halt = processor.halt_handle();
    let thread = ThreadBuilder::new()
        .thread_name(format!("bench-{strategy}"))
        .spawn_processor(processor)
        .unwrap();

    group.throughput(Throughput::Elements(burst_size));
    group.bench_function(BenchmarkId::new(strategy.to_string(), burst_size), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let last = pipeline
                    .publish_batch_with(burst_size as usize, |event, sequence| {
                        event.value = black_box(sequence);
                    })
                    .unwrap();
                while pipeline.arena().get(consumer).get() < last {
                    std::hint::spin_loop();
                }
            }
            start.elapsed()
        })
    });

    halt.halt();
    let (outcome, _) = thread.join().unwrap();
    outcome.unwrap();
}

fn spsc_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");
    group.measurement_time(Duration::from_secs(5));

    for burst_size in BURST_SIZES {
        baseline(&mut group, burst_size);
        for strategy in WaitStrategyType::ALL {
            pipeline_burst(&mut group, strategy, burst_size);
        }
    }

    group.finish();
}

criterion_group!(spsc, spsc_benchmark);
criterion_main!(spsc);
