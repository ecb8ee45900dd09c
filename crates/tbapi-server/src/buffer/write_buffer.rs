//! Buffered or direct writes behind one interface.

use std::sync::Arc;

use tracing::info;

use super::coalescer::Coalescer;
use super::flush::Flush;
use super::types::{BufferConfigError, BufferError, BufferStats, FlushResult, Flushed};
use crate::config::BufferSettings;

/// Either a [`Coalescer`] or a passthrough that flushes each item alone.
///
/// The passthrough behaves like a coalescer with capacity 1: every `put`
/// results in one flush call with a single item.
pub enum WriteBuffer<T, F: Flush<T>> {
    Buffered(Coalescer<T, F>),
    Direct(F),
}

impl<T, F> WriteBuffer<T, F>
where
    T: Send + 'static,
    F: Flush<T>,
{
    pub fn buffered(
        capacity: usize,
        delay: std::time::Duration,
        flush: F,
    ) -> Result<Self, BufferConfigError> {
        Coalescer::new(capacity, delay, flush).map(WriteBuffer::Buffered)
    }

    pub fn direct(flush: F) -> Self {
        WriteBuffer::Direct(flush)
    }

    /// Builds the buffer described by `settings`.
    pub fn from_settings(settings: &BufferSettings, flush: F) -> Result<Self, BufferConfigError> {
        if settings.enabled {
            info!(
                capacity = settings.capacity,
                delay_ms = settings.delay_ms,
                "write buffering enabled"
            );
            Self::buffered(settings.capacity, settings.delay(), flush)
        } else {
            info!("write buffering disabled");
            Ok(Self::direct(flush))
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, WriteBuffer::Buffered(_))
    }

    /// Submits an item and waits for its outcome.
    pub async fn put(&self, item: T) -> FlushResult<F::Outcome, F::Error> {
        match self {
            WriteBuffer::Buffered(coalescer) => coalescer.put(item).await,
            WriteBuffer::Direct(flush) => {
                let outcomes = flush.flush(vec![item]).await.map_err(BufferError::Flush)?;
                if outcomes.len() != 1 {
                    return Err(BufferError::OutcomeCountMismatch {
                        expected: 1,
                        actual: outcomes.len(),
                    });
                }
                Ok(Flushed::new(Arc::from(outcomes), 0))
            }
        }
    }

    /// Flushes the live batch, if buffering.
    pub async fn flush_pending(&self) {
        if let WriteBuffer::Buffered(coalescer) = self {
            coalescer.flush_pending().await;
        }
    }

    /// Buffer counters; `None` for the passthrough.
    pub fn stats(&self) -> Option<BufferStats> {
        match self {
            WriteBuffer::Buffered(coalescer) => Some(coalescer.stats()),
            WriteBuffer::Direct(_) => None,
        }
    }
}
