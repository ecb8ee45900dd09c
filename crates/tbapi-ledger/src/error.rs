//! Ledger error types.

use thiserror::Error;

/// Errors that fail a whole ledger request.
///
/// Per-event rejections (duplicate ids, missing accounts, exceeded limits)
/// are not errors; they are reported as [`crate::EventResult`] entries.
/// These variants are `Clone` because a single failed batch is reported to
/// every caller that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The request carries more events than one ledger batch may hold.
    #[error("too many events in one request: {count} (max {max})")]
    TooManyEvents { count: usize, max: usize },

    /// The request is malformed as a whole.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The ledger cannot be reached.
    #[error("ledger unavailable: {message}")]
    Unavailable { message: String },

    /// Internal error.
    #[error("internal ledger error: {message}")]
    Internal { message: String },
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
