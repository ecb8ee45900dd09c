//! Coalescing write buffer.
//!
//! Concurrent callers submit individual items with [`Coalescer::put`]. Items
//! accumulate in a live batch until either:
//!
//! 1. **Capacity**: the batch holds `capacity` items, or
//! 2. **Deadline**: `delay` has passed since the first item of the batch
//!
//! whichever comes first. The batch is then flushed with exactly one call to
//! the [`Flush`] implementation, and every caller receives the result: its own
//! outcome on success, or the same error as every other caller of that batch.
//!
//! [`WriteBuffer`] selects between the coalescer and a direct passthrough that
//! flushes every item on its own.
//!
//! ```ignore
//! let buffer = Coalescer::new(1024, Duration::from_millis(100), flush_fn(|items| async move {
//!     ledger.create(items).await
//! }))?;
//! let flushed = buffer.put(item).await?;
//! let outcome = flushed.outcome();
//! ```

mod coalescer;
mod flush;
mod slot;
mod types;
mod write_buffer;

pub use coalescer::Coalescer;
pub use flush::{flush_fn, Flush, FlushFn};
pub use types::{BufferConfigError, BufferError, BufferStats, FlushResult, Flushed};
pub use write_buffer::WriteBuffer;
