//! tbapi-server: Write buffering and request handlers
//!
//! This crate contains the layer between the gRPC surface and the ledger:
//! - The coalescing write buffer that turns many concurrent writes into one
//!   ledger call
//! - Request handlers built on top of it
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               tbapi-server                   │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  buffer/     - Coalescing write buffer      │
//! │    slot.rs        - One-shot result cells   │
//! │    coalescer.rs   - Batching and flushing   │
//! │    write_buffer.rs - Buffered or direct     │
//! │  handlers/   - Request handlers             │
//! │    transfers.rs   - Transfer creation       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod buffer;
pub mod config;
pub mod handlers;

// Re-exports for convenience
pub use buffer::{BufferError, Coalescer, Flush, Flushed, WriteBuffer};
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::{CreateTransfersError, TransferWriter};
