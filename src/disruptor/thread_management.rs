//! Consumer threads with naming and CPU pinning
//!
//! [`ThreadBuilder`] spawns a named thread, optionally pinned to one core, and
//! returns a [`ManagedThread`] that yields the closure's result on `join`.
//! [`ThreadBuilder::spawn_processor`] is the usual entry point: it runs a
//! [`BatchEventProcessor`] loop and hands back its handler once the loop ends.

use crate::disruptor::{BatchEventProcessor, EventHandler, Result, SequenceBarrier};
use core_affinity::CoreId;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Name and affinity for the next spawned thread
#[derive(Debug, Clone, Default)]
pub struct ThreadContext {
    affinity: Option<CoreId>,
    name: Option<String>,
    id: usize,
}

impl ThreadContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request pinning to `core_id`
    ///
    /// Unknown cores are only reported; the thread then runs unpinned.
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        if !get_available_cores().contains(&core_id) {
            warn!(core_id, "requested CPU core is not available, thread will not be pinned");
        }
        self.affinity = Some(CoreId { id: core_id });
        self
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Take the configured name, or generate `consumer-<n>`
    pub(crate) fn get_name(&mut self) -> String {
        self.name.take().unwrap_or_else(|| {
            self.id += 1;
            format!("consumer-{id}", id = self.id)
        })
    }

    pub(crate) fn get_affinity(&mut self) -> Option<CoreId> {
        self.affinity.take()
    }
}

/// A spawned thread whose result is collected by [`join`](Self::join)
///
/// Dropping it joins the thread and discards the result.
pub struct ManagedThread<R = ()> {
    join_handle: Option<JoinHandle<R>>,
    thread_name: String,
}

impl<R> ManagedThread<R> {
    pub(crate) fn new(join_handle: JoinHandle<R>, thread_name: String) -> Self {
        Self {
            join_handle: Some(join_handle),
            thread_name,
        }
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Wait for the thread and return what its closure returned
    ///
    /// # Errors
    /// Returns the panic payload if the thread panicked
    pub fn join(mut self) -> thread::Result<R> {
        match self.join_handle.take() {
            Some(handle) => handle.join(),
            None => Err(Box::new("thread already joined")),
        }
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<R> Drop for ManagedThread<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                warn!(thread = %self.thread_name, "managed thread panicked");
            }
        }
    }
}

impl<R> std::fmt::Debug for ManagedThread<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedThread")
            .field("thread_name", &self.thread_name)
            .field("is_running", &self.is_running())
            .finish()
    }
}

/// Builder for consumer threads
#[derive(Debug, Default)]
pub struct ThreadBuilder {
    context: ThreadContext,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the thread to `core_id`; best effort
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        self.context = self.context.pin_at_core(core_id);
        self
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.context = self.context.thread_name(name);
        self
    }

    /// Spawn `f` on a new thread with the configured name and affinity
    ///
    /// # Errors
    /// Returns the OS error if the thread could not be created
    pub fn spawn<F, R>(mut self, f: F) -> std::io::Result<ManagedThread<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let thread_name = self.context.get_name();
        let affinity = self.context.get_affinity();

        let name = thread_name.clone();
        let join_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                set_affinity_if_defined(affinity, &name);
                f()
            })?;

        Ok(ManagedThread::new(join_handle, thread_name))
    }

    /// Run `processor` on a new thread until it is halted or its handler fails
    ///
    /// Joining yields the processor's run result together with the handler, so
    /// state accumulated by the handler can be inspected afterwards.
    pub fn spawn_processor<T, B, H>(
        self,
        mut processor: BatchEventProcessor<T, B, H>,
    ) -> std::io::Result<ManagedThread<(Result<()>, H)>>
    where
        T: Send + Sync + 'static,
        B: SequenceBarrier + 'static,
        H: EventHandler<T> + 'static,
    {
        self.spawn(move || {
            let outcome = processor.run();
            (outcome, processor.into_handler())
        })
    }
}

fn set_affinity_if_defined(affinity: Option<CoreId>, thread_name: &str) {
    if let Some(core_id) = affinity {
        if core_affinity::set_for_current(core_id) {
            debug!(thread = thread_name, core_id = core_id.id, "thread pinned");
        } else {
            warn!(thread = thread_name, core_id = core_id.id, "could not pin thread");
        }
    }
}

/// IDs of the CPU cores this process may run on
pub fn get_available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .iter()
        .map(|core| core.id)
        .collect()
}
