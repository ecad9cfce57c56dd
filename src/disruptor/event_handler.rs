//! Event Handler Implementation
//!
//! This module provides the EventHandler trait and related functionality for
//! consuming events inside a [`BatchEventProcessor`](crate::disruptor::BatchEventProcessor).

/// Handler for processing events from the ring buffer
///
/// Handlers see events through a shared reference. Several consumers may read the
/// same slot concurrently, so only producers write slots.
///
/// # Type Parameters
/// * `T` - The event type that will be processed
pub trait EventHandler<T>: Send {
    /// Process an event
    ///
    /// # Arguments
    /// * `event` - The event to process
    /// * `sequence` - The sequence number of the event in the ring buffer
    /// * `end_of_batch` - True if this is the last event of the batch the barrier returned
    ///
    /// # Errors
    /// Any error stops the processor; it is returned from `run()` with the failing sequence.
    ///
    /// # Examples
    /// ```
    /// use seqring::EventHandler;
    ///
    /// struct Trade {
    ///     quantity: u64,
    /// }
    ///
    /// #[derive(Default)]
    /// struct VolumeCounter {
    ///     volume: u64,
    /// }
    ///
    /// impl EventHandler<Trade> for VolumeCounter {
    ///     fn on_event(&mut self, event: &Trade, _sequence: u64, _end_of_batch: bool) -> anyhow::Result<()> {
    ///         self.volume += event.quantity;
    ///         Ok(())
    ///     }
    /// }
    /// ```
    fn on_event(&mut self, event: &T, sequence: u64, end_of_batch: bool) -> anyhow::Result<()>;

    /// Called once on the processor thread before the first event
    fn on_start(&mut self) {}

    /// Called once on the processor thread after the loop exits
    fn on_shutdown(&mut self) {}
}

/// A simple event handler that can be created from a closure
///
/// # Type Parameters
/// * `T` - The event type
/// * `F` - The closure type
pub struct ClosureEventHandler<T, F>
where
    F: FnMut(&T, u64, bool) -> anyhow::Result<()> + Send,
{
    handler: F,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> ClosureEventHandler<T, F>
where
    F: FnMut(&T, u64, bool) -> anyhow::Result<()> + Send,
{
    /// Create a new closure-based event handler
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventHandler<T> for ClosureEventHandler<T, F>
where
    F: FnMut(&T, u64, bool) -> anyhow::Result<()> + Send,
{
    fn on_event(&mut self, event: &T, sequence: u64, end_of_batch: bool) -> anyhow::Result<()> {
        (self.handler)(event, sequence, end_of_batch)
    }
}

/// A no-op event handler for testing and benchmarking
///
/// Useful for measuring the overhead of the coordination machinery itself.
pub struct NoOpEventHandler<T> {
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T> NoOpEventHandler<T> {
    /// Create a new no-op event handler
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for NoOpEventHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventHandler<T> for NoOpEventHandler<T> {
    fn on_event(&mut self, _event: &T, _sequence: u64, _end_of_batch: bool) -> anyhow::Result<()> {
        Ok(())
    }
}
