//! Ledger trait definition.

use async_trait::async_trait;

use crate::error::LedgerResult;
use crate::results::{CreateAccountsResult, CreateTransfersResult};
use crate::types::{Account, AccountBalance, AccountFilter, Transfer};

/// Maximum number of events accepted in one ledger request.
pub const MAX_BATCH_EVENTS: usize = 8189;

/// Abstract interface to the accounting ledger.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
///
/// Write operations are batch-oriented: one call carries many events and
/// returns only the events that were rejected (see [`crate::EventResult`]).
/// An `Err` fails the whole request.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    // Write operations

    /// Creates accounts, in order.
    async fn create_accounts(&self, accounts: Vec<Account>)
        -> LedgerResult<Vec<CreateAccountsResult>>;

    /// Creates transfers, in order.
    async fn create_transfers(
        &self,
        transfers: Vec<Transfer>,
    ) -> LedgerResult<Vec<CreateTransfersResult>>;

    // Read operations

    /// Looks up accounts by id. Unknown ids are omitted from the response.
    async fn lookup_accounts(&self, ids: &[u128]) -> LedgerResult<Vec<Account>>;

    /// Looks up transfers by id. Unknown ids are omitted from the response.
    async fn lookup_transfers(&self, ids: &[u128]) -> LedgerResult<Vec<Transfer>>;

    /// Lists transfers touching an account.
    async fn get_account_transfers(&self, filter: &AccountFilter) -> LedgerResult<Vec<Transfer>>;

    /// Lists the recorded balance history of an account.
    ///
    /// Only accounts created with the `history` flag record balances.
    async fn get_account_balances(
        &self,
        filter: &AccountFilter,
    ) -> LedgerResult<Vec<AccountBalance>>;
}
