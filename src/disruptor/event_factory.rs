//! Event Factory Implementation
//!
//! Factories pre-populate every slot of the ring buffer once, at construction.
//! No event is allocated after that; slots are overwritten in place.

/// Factory for creating the events that fill the ring buffer
///
/// # Examples
/// ```
/// use seqring::EventFactory;
///
/// struct Tick {
///     price: u64,
/// }
///
/// struct TickFactory;
///
/// impl EventFactory<Tick> for TickFactory {
///     fn new_instance(&self) -> Tick {
///         Tick { price: 0 }
///     }
/// }
/// ```
pub trait EventFactory<T>: Send + Sync {
    /// Create a new event instance in its initial state
    fn new_instance(&self) -> T;
}

/// Event factory that uses the Default trait
pub struct DefaultEventFactory<T: Default> {
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T: Default> DefaultEventFactory<T> {
    /// Create a new default event factory
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Default> Default for DefaultEventFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> EventFactory<T> for DefaultEventFactory<T> {
    fn new_instance(&self) -> T {
        T::default()
    }
}

/// Event factory that uses a closure to create events
pub struct ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    factory_fn: F,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    /// Create a new closure-based event factory
    pub fn new(factory_fn: F) -> Self {
        Self {
            factory_fn,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventFactory<T> for ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    fn new_instance(&self) -> T {
        (self.factory_fn)()
    }
}

/// Shorthand for [`ClosureEventFactory::new`]
pub fn event_factory<T, F>(factory_fn: F) -> ClosureEventFactory<T, F>
where
    F: Fn() -> T + Send + Sync,
{
    ClosureEventFactory::new(factory_fn)
}
