//! Data types for the write buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The result a producer receives once its batch has been flushed.
///
/// All producers of one batch share the same outcome sequence; each one also
/// knows its own position in it.
#[derive(Debug)]
pub struct Flushed<R> {
    outcomes: Arc<[R]>,
    index: usize,
}

impl<R> Flushed<R> {
    pub(crate) fn new(outcomes: Arc<[R]>, index: usize) -> Self {
        debug_assert!(index < outcomes.len());
        Self { outcomes, index }
    }

    /// The outcome for this producer's own item.
    pub fn outcome(&self) -> &R {
        &self.outcomes[self.index]
    }

    /// Position of this producer's item within its batch.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Outcomes of the whole batch, in submission order.
    pub fn batch(&self) -> &[R] {
        &self.outcomes
    }
}

impl<R: Clone> Flushed<R> {
    pub fn into_outcome(self) -> R {
        self.outcomes[self.index].clone()
    }
}

impl<R> Clone for Flushed<R> {
    fn clone(&self) -> Self {
        Self {
            outcomes: Arc::clone(&self.outcomes),
            index: self.index,
        }
    }
}

/// Errors delivered to producers.
///
/// Every producer of a failed batch receives an identical copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError<E> {
    /// The flush function failed.
    #[error("flush failed: {0}")]
    Flush(E),

    /// The flush function returned the wrong number of outcomes, so they
    /// cannot be matched to producers.
    #[error("flush returned {actual} outcomes for {expected} items")]
    OutcomeCountMismatch { expected: usize, actual: usize },

    /// The batch was dropped without a result, e.g. because the flush task
    /// panicked or the runtime shut down.
    #[error("batch abandoned before it was flushed")]
    Abandoned,
}

/// Result delivered to each producer.
pub type FlushResult<R, E> = Result<Flushed<R>, BufferError<E>>;

/// Invalid buffer limits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferConfigError {
    #[error("buffer capacity must be greater than 0")]
    ZeroCapacity,

    #[error("buffer delay must be greater than 0")]
    ZeroDelay,
}

/// Snapshot of buffer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Batches handed to the flush function.
    pub batches_flushed: u64,
    /// Items across all flushed batches.
    pub items_flushed: u64,
    /// Batches retired because they reached capacity.
    pub capacity_flushes: u64,
    /// Batches retired by their deadline.
    pub deadline_flushes: u64,
    /// Batches whose flush failed.
    pub failed_batches: u64,
}

/// What retired a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Capacity,
    Deadline,
    Drain,
}

impl Trigger {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Trigger::Capacity => "capacity",
            Trigger::Deadline => "deadline",
            Trigger::Drain => "drain",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    batches_flushed: AtomicU64,
    items_flushed: AtomicU64,
    capacity_flushes: AtomicU64,
    deadline_flushes: AtomicU64,
    failed_batches: AtomicU64,
}

impl Counters {
    pub(crate) fn record(&self, trigger: Trigger, items: usize, failed: bool) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.items_flushed
            .fetch_add(items as u64, Ordering::Relaxed);
        match trigger {
            Trigger::Capacity => {
                self.capacity_flushes.fetch_add(1, Ordering::Relaxed);
            }
            Trigger::Deadline => {
                self.deadline_flushes.fetch_add(1, Ordering::Relaxed);
            }
            Trigger::Drain => {}
        }
        if failed {
            self.failed_batches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> BufferStats {
        BufferStats {
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            items_flushed: self.items_flushed.load(Ordering::Relaxed),
            capacity_flushes: self.capacity_flushes.load(Ordering::Relaxed),
            deadline_flushes: self.deadline_flushes.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }
}
