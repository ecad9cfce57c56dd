//! Wait Strategy Implementation
//!
//! This module provides different wait strategies for the Disruptor pattern.
//! Wait strategies determine how consumers wait for new events to become available.
//!
//! Every strategy re-checks the barrier's alert flag on each iteration, so a halt
//! request interrupts a wait within one backoff step.

use crate::disruptor::{AlertFlag, Alerted, CachedSequenceGroup};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Strategy for waiting for events to become available
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait until `dependencies` reach `sequence`
    ///
    /// # Arguments
    /// * `sequence` - The sequence to wait for
    /// * `dependencies` - The sequences gating this consumer
    /// * `alert` - The barrier's alert flag, checked every iteration
    ///
    /// # Returns
    /// The available sequence, which may be higher than requested. Strategies that
    /// wake on a timeout may return a lower value; callers must re-check.
    ///
    /// # Errors
    /// Returns `Alerted` as soon as the alert flag is observed raised
    fn wait_for(
        &self,
        sequence: u64,
        dependencies: &mut CachedSequenceGroup,
        alert: &AlertFlag,
    ) -> std::result::Result<u64, Alerted>;

    /// Wake any consumers parked in this strategy
    ///
    /// Called on every publish and every alert. Non-blocking strategies do nothing.
    fn signal_all_when_blocking(&self);

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}

const BACKOFF_SPIN_TRIES: u32 = 100;
const BACKOFF_YIELD_TRIES: u32 = 10;
const BACKOFF_PARK: Duration = Duration::from_micros(1);

/// Staged backoff counter: spin, then yield, then park briefly
///
/// After a park the counter returns to the spin phase. Used by producers waiting
/// for capacity and by [`AdaptiveWaitStrategy`].
#[derive(Debug, Default, Clone)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Back off once
    #[inline]
    pub fn snooze(&mut self) {
        if self.step < BACKOFF_SPIN_TRIES {
            std::hint::spin_loop();
            self.step += 1;
        } else if self.step < BACKOFF_SPIN_TRIES + BACKOFF_YIELD_TRIES {
            thread::yield_now();
            self.step += 1;
        } else {
            thread::park_timeout(BACKOFF_PARK);
            self.step = 0;
        }
    }

    /// Return to the spin phase
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// True while the next snooze would still spin
    pub fn is_spinning(&self) -> bool {
        self.step < BACKOFF_SPIN_TRIES
    }
}

/// Blocking wait strategy using a mutex and condition variable
///
/// Lowest CPU use of all strategies. Publishers only touch the lock when a consumer
/// is actually parked. Waits are bounded by a timeout so consumers gated on other
/// consumers (whose progress is never signalled) still observe it.
#[derive(Debug)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
    waiters: AtomicUsize,
    timeout: Duration,
}

impl BlockingWaitStrategy {
    /// Default bound on a single park
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1);

    /// Create a new blocking wait strategy
    pub fn new() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Create a blocking wait strategy that parks for at most `timeout` at a time
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            waiters: AtomicUsize::new(0),
            timeout,
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: u64,
        dependencies: &mut CachedSequenceGroup,
        alert: &AlertFlag,
    ) -> std::result::Result<u64, Alerted> {
        loop {
            alert.check()?;
            let available = dependencies.get();
            if available >= sequence {
                return Ok(available);
            }

            let mut guard = self.mutex.lock();
            self.waiters.fetch_add(1, Ordering::SeqCst);
            // Pairs with the fence in `signal_all_when_blocking`.
            fence(Ordering::SeqCst);
            if dependencies.get() < sequence && !alert.is_raised() {
                self.condvar.wait_for(&mut guard, self.timeout);
            }
            self.waiters.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn signal_all_when_blocking(&self) {
        // Orders the caller's cursor store before the waiter count load.
        fence(Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _guard = self.mutex.lock();
            self.condvar.notify_all();
        }
    }

    fn name(&self) -> &'static str {
        "blocking"
    }
}

/// Yielding wait strategy
///
/// Yields the thread on every miss. Good compromise between latency and CPU usage
/// when there are spare cores.
#[derive(Debug, Default)]
pub struct YieldingWaitStrategy;

impl YieldingWaitStrategy {
    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: u64,
        dependencies: &mut CachedSequenceGroup,
        alert: &AlertFlag,
    ) -> std::result::Result<u64, Alerted> {
        loop {
            alert.check()?;
            let available = dependencies.get();
            if available >= sequence {
                return Ok(available);
            }
            thread::yield_now();
        }
    }

    fn signal_all_when_blocking(&self) {}

    fn name(&self) -> &'static str {
        "yield"
    }
}

/// Busy spin wait strategy
///
/// Lowest latency, but occupies a full core. Use only when consumer threads are
/// pinned to dedicated cores.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: u64,
        dependencies: &mut CachedSequenceGroup,
        alert: &AlertFlag,
    ) -> std::result::Result<u64, Alerted> {
        loop {
            alert.check()?;
            let available = dependencies.get();
            if available >= sequence {
                return Ok(available);
            }
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}

    fn name(&self) -> &'static str {
        "busy-spin"
    }
}

/// Sleeping wait strategy
///
/// Spins, then yields, then sleeps for a fixed interval on every further miss.
/// CPU use stays bounded; latency spikes after quiet periods are expected.
#[derive(Debug, Clone)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep: Duration,
}

impl SleepingWaitStrategy {
    pub const DEFAULT_RETRIES: u32 = 200;
    pub const DEFAULT_SLEEP_NANOS: u64 = 100;
    /// Retries above this count are pure spins, below it yields
    const SPIN_THRESHOLD: u32 = 100;

    /// Create a sleeping wait strategy with the default retry and sleep settings
    pub fn new() -> Self {
        Self::with_settings(Self::DEFAULT_RETRIES, Self::DEFAULT_SLEEP_NANOS)
    }

    /// # Arguments
    /// * `retries` - How many misses to absorb before sleeping
    /// * `sleep_nanos` - How long each sleep lasts
    pub fn with_settings(retries: u32, sleep_nanos: u64) -> Self {
        Self {
            retries,
            sleep: Duration::from_nanos(sleep_nanos),
        }
    }

    #[inline]
    fn apply_wait_method(&self, counter: u32) -> u32 {
        if counter > Self::SPIN_THRESHOLD {
            counter - 1
        } else if counter > 0 {
            thread::yield_now();
            counter - 1
        } else {
            thread::sleep(self.sleep);
            counter
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: u64,
        dependencies: &mut CachedSequenceGroup,
        alert: &AlertFlag,
    ) -> std::result::Result<u64, Alerted> {
        let mut counter = self.retries;
        loop {
            alert.check()?;
            let available = dependencies.get();
            if available >= sequence {
                return Ok(available);
            }
            counter = self.apply_wait_method(counter);
        }
    }

    fn signal_all_when_blocking(&self) {}

    fn name(&self) -> &'static str {
        "sleep"
    }
}

/// Adaptive wait strategy driven by a [`Backoff`] counter
#[derive(Debug, Default)]
pub struct AdaptiveWaitStrategy;

impl AdaptiveWaitStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for AdaptiveWaitStrategy {
    fn wait_for(
        &self,
        sequence: u64,
        dependencies: &mut CachedSequenceGroup,
        alert: &AlertFlag,
    ) -> std::result::Result<u64, Alerted> {
        let mut backoff = Backoff::new();
        loop {
            alert.check()?;
            let available = dependencies.get();
            if available >= sequence {
                return Ok(available);
            }
            backoff.snooze();
        }
    }

    fn signal_all_when_blocking(&self) {}

    fn name(&self) -> &'static str {
        "adaptive"
    }
}

/// Selector for the built-in wait strategies
///
/// # Examples
/// ```
/// use seqring::WaitStrategyType;
///
/// let strategy: WaitStrategyType = "yield".parse().unwrap();
/// assert_eq!(strategy.create().name(), "yield");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategyType {
    BusySpin,
    Yield,
    Sleep,
    Adaptive,
    #[default]
    Blocking,
}

impl WaitStrategyType {
    /// Instantiate the strategy with its default settings
    pub fn create(self) -> Arc<dyn WaitStrategy> {
        match self {
            WaitStrategyType::BusySpin => Arc::new(BusySpinWaitStrategy::new()),
            WaitStrategyType::Yield => Arc::new(YieldingWaitStrategy::new()),
            WaitStrategyType::Sleep => Arc::new(SleepingWaitStrategy::new()),
            WaitStrategyType::Adaptive => Arc::new(AdaptiveWaitStrategy::new()),
            WaitStrategyType::Blocking => Arc::new(BlockingWaitStrategy::new()),
        }
    }

    /// All built-in strategies
    pub const ALL: [WaitStrategyType; 5] = [
        WaitStrategyType::BusySpin,
        WaitStrategyType::Yield,
        WaitStrategyType::Sleep,
        WaitStrategyType::Adaptive,
        WaitStrategyType::Blocking,
    ];
}

impl std::fmt::Display for WaitStrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WaitStrategyType::BusySpin => "busy-spin",
            WaitStrategyType::Yield => "yield",
            WaitStrategyType::Sleep => "sleep",
            WaitStrategyType::Adaptive => "adaptive",
            WaitStrategyType::Blocking => "blocking",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for WaitStrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "busy-spin" | "busyspin" | "spin" => Ok(WaitStrategyType::BusySpin),
            "yield" | "yielding" => Ok(WaitStrategyType::Yield),
            "sleep" | "sleeping" => Ok(WaitStrategyType::Sleep),
            "adaptive" => Ok(WaitStrategyType::Adaptive),
            "blocking" | "block" => Ok(WaitStrategyType::Blocking),
            _ => Err(format!(
                "Invalid wait strategy: '{s}'. Valid values are 'busy-spin', 'yield', 'sleep', 'adaptive' or 'blocking'"
            )),
        }
    }
}
