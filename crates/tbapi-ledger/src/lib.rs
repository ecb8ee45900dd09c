//! tbapi-ledger: Ledger abstraction layer
//!
//! This crate provides the ledger abstraction for tbapi, including:
//! - Account and transfer records with 128-bit identifiers
//! - The `Ledger` trait, the single downstream capability the gateway writes to
//! - An in-memory implementation for tests and single-process deployments
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               tbapi-ledger                   │
//! ├─────────────────────────────────────────────┤
//! │  types.rs    - Accounts, transfers, filters │
//! │  results.rs  - Per-event result codes       │
//! │  traits.rs   - Ledger trait definition      │
//! │  memory.rs   - In-memory implementation     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod results;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{LedgerError, LedgerResult};
pub use memory::MemoryLedger;
pub use results::{
    CreateAccountResult, CreateAccountsResult, CreateTransferResult, CreateTransfersResult,
    EventResult,
};
pub use traits::{Ledger, MAX_BATCH_EVENTS};
pub use types::{
    Account, AccountBalance, AccountFilter, AccountFilterFlags, AccountFlags, Transfer,
    TransferFlags,
};
