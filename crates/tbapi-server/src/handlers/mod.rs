//! Request handlers.

mod transfers;

pub use transfers::{CreateTransfersError, LedgerTransfers, TransferWriter};
