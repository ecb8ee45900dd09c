//! The coalescer: accumulates items and flushes them in batches.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, error, warn};

use super::flush::Flush;
use super::slot::{wait_slot, SlotWriter};
use super::types::{
    BufferConfigError, BufferError, BufferStats, Counters, FlushResult, Flushed, Trigger,
};

type Writer<F, T> =
    SlotWriter<FlushResult<<F as Flush<T>>::Outcome, <F as Flush<T>>::Error>>;

/// A retired batch, owned by the single flush that will send it.
struct Batch<T, W> {
    items: Vec<T>,
    slots: Vec<W>,
}

/// The live batch.
///
/// `generation` advances every time a batch is retired, so a deadline timer
/// can tell whether the batch it was armed for is still live. `timer` is the
/// deadline task of the live batch, if one is armed.
struct State<T, W> {
    generation: u64,
    items: Vec<T>,
    slots: Vec<W>,
    timer: Option<AbortHandle>,
}

impl<T, W> State<T, W> {
    /// Moves the live batch out and cancels its deadline timer.
    fn retire(&mut self) -> Batch<T, W> {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        Batch {
            items: mem::take(&mut self.items),
            slots: mem::take(&mut self.slots),
        }
    }
}


struct Inner<T, F: Flush<T>> {
    flush: F,
    capacity: usize,
    delay: Duration,
    state: Mutex<State<T, Writer<F, T>>>,
    counters: Counters,
}

/// Request-coalescing buffer.
///
/// Cloning is cheap; clones share the same live batch.
///
/// `put` must be called from within a Tokio runtime: deadline timers and
/// capacity flushes run as spawned tasks, so a producer that stops waiting
/// cannot cancel a flush other producers depend on.
pub struct Coalescer<T, F: Flush<T>> {
    inner: Arc<Inner<T, F>>,
}

impl<T, F: Flush<T>> Clone for Coalescer<T, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, F> Coalescer<T, F>
where
    T: Send + 'static,
    F: Flush<T>,
{
    /// Creates a coalescer that flushes after `capacity` items or `delay`,
    /// whichever comes first.
    pub fn new(capacity: usize, delay: Duration, flush: F) -> Result<Self, BufferConfigError> {
        if capacity == 0 {
            return Err(BufferConfigError::ZeroCapacity);
        }
        if delay.is_zero() {
            return Err(BufferConfigError::ZeroDelay);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                flush,
                capacity,
                delay,
                state: Mutex::new(State {
                    generation: 0,
                    items: Vec::with_capacity(capacity),
                    slots: Vec::with_capacity(capacity),
                    timer: None,
                }),
                counters: Counters::default(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Number of items in the live batch.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.counters.snapshot()
    }

    /// Handles on the shared state, this one included. Each armed timer and
    /// each running flush holds one.
    #[cfg(test)]
    pub(crate) fn shared_handles(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Submits an item and waits until its batch has been flushed.
    ///
    /// If the item fills the batch, the batch is retired before this call
    /// first yields and its flush runs on a spawned task, not on the caller.
    /// Dropping the returned future does not withdraw the item.
    pub async fn put(&self, item: T) -> FlushResult<F::Outcome, F::Error> {
        let (writer, reader) = wait_slot();

        let full = {
            let mut state = self.inner.state.lock();
            state.items.push(item);
            state.slots.push(writer);

            if state.items.len() >= self.inner.capacity {
                Some(state.retire())
            } else {
                if state.items.len() == 1 {
                    // Stored under the lock, so a retirement always sees it.
                    let generation = state.generation;
                    state.timer = Some(Inner::arm_timer(&self.inner, generation));
                }
                None
            }
        };

        if let Some(batch) = full {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run(batch, Trigger::Capacity).await });
        }

        reader.wait().await.unwrap_or(Err(BufferError::Abandoned))
    }

    /// Retires the live batch, if any, and flushes it now.
    ///
    /// Returns once its producers have been answered.
    pub async fn flush_pending(&self) {
        let batch = {
            let mut state = self.inner.state.lock();
            if state.items.is_empty() {
                None
            } else {
                Some(state.retire())
            }
        };

        if let Some(batch) = batch {
            self.inner.run(batch, Trigger::Drain).await;
        }
    }
}

impl<T, F> Inner<T, F>
where
    T: Send + 'static,
    F: Flush<T>,
{
    /// Spawns the deadline task for batch `generation`.
    ///
    /// Only spawns; the caller holds the state lock and the task cannot
    /// touch the state until it is released.
    fn arm_timer(this: &Arc<Self>, generation: u64) -> AbortHandle {
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;

            let batch = {
                let mut state = inner.state.lock();
                // Retired by capacity or a drain while the abort was in flight.
                if state.generation != generation || state.items.is_empty() {
                    return;
                }
                // This task is the timer; it must not abort itself.
                state.timer = None;
                state.retire()
            };

            inner.run(batch, Trigger::Deadline).await;
        })
        .abort_handle()
    }

    /// Flushes a retired batch and answers every producer in it.
    async fn run(&self, batch: Batch<T, Writer<F, T>>, trigger: Trigger) {
        let Batch { items, slots } = batch;
        let expected = items.len();

        let result = match self.flush.flush(items).await {
            Ok(outcomes) if outcomes.len() == expected => Ok(Arc::<[F::Outcome]>::from(outcomes)),
            Ok(outcomes) => {
                warn!(
                    expected,
                    actual = outcomes.len(),
                    trigger = trigger.as_str(),
                    "flush returned a mismatched number of outcomes"
                );
                Err(BufferError::OutcomeCountMismatch {
                    expected,
                    actual: outcomes.len(),
                })
            }
            Err(err) => {
                error!(error = %err, items = expected, trigger = trigger.as_str(), "batch flush failed");
                Err(BufferError::Flush(err))
            }
        };

        self.counters.record(trigger, expected, result.is_err());
        debug!(items = expected, trigger = trigger.as_str(), "batch flushed");

        let mut gone = 0;
        for (index, slot) in slots.into_iter().enumerate() {
            let delivery = match &result {
                Ok(outcomes) => Ok(Flushed::new(Arc::clone(outcomes), index)),
                Err(err) => Err(err.clone()),
            };
            if !slot.deliver(delivery) {
                gone += 1;
            }
        }
        if gone > 0 {
            debug!(gone, "producers stopped waiting before their batch was flushed");
        }
    }
}
