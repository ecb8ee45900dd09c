//! In-memory ledger implementation.
//!
//! All state lives behind a single `RwLock`, so every batch is applied
//! atomically with respect to other batches. Linked chains are applied
//! event by event with an undo journal; a failing event rolls the whole
//! chain back.
//!
//! Pending transfer timeouts are stored but never expire here.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{LedgerError, LedgerResult};
use crate::results::{
    ChainOutcome, CreateAccountResult, CreateAccountsResult, CreateTransferResult,
    CreateTransfersResult, EventResult,
};
use crate::traits::{Ledger, MAX_BATCH_EVENTS};
use crate::types::{Account, AccountBalance, AccountFilter, Transfer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStatus {
    Pending,
    Posted,
    Voided,
}

/// A balance snapshot, tagged with the side of the transfer that produced it.
#[derive(Debug, Clone)]
struct HistoryEntry {
    balance: AccountBalance,
    debit: bool,
}

/// Reverts one mutation made while applying a linked chain.
enum Undo {
    AccountCreated(u128),
    AccountChanged(Account),
    TransferCreated(u128),
    PendingStatus {
        id: u128,
        previous: Option<PendingStatus>,
    },
    HistoryRecorded(u128),
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<u128, Account>,
    /// Transfers in commit order, which is also timestamp order.
    transfers: Vec<Transfer>,
    transfer_index: HashMap<u128, usize>,
    pending: HashMap<u128, PendingStatus>,
    history: HashMap<u128, Vec<HistoryEntry>>,
    last_timestamp: u64,
}

impl LedgerState {
    /// Returns a strictly increasing nanosecond timestamp.
    fn next_timestamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn transfer(&self, id: u128) -> Option<&Transfer> {
        self.transfer_index.get(&id).map(|&idx| &self.transfers[idx])
    }

    fn rollback(&mut self, journal: &mut Vec<Undo>) {
        while let Some(undo) = journal.pop() {
            match undo {
                Undo::AccountCreated(id) => {
                    self.accounts.remove(&id);
                }
                Undo::AccountChanged(previous) => {
                    self.accounts.insert(previous.id, previous);
                }
                Undo::TransferCreated(id) => {
                    // Undone in reverse order, so the transfer is always the last one.
                    if let Some(idx) = self.transfer_index.remove(&id) {
                        self.transfers.truncate(idx);
                    }
                }
                Undo::PendingStatus { id, previous } => match previous {
                    Some(status) => {
                        self.pending.insert(id, status);
                    }
                    None => {
                        self.pending.remove(&id);
                    }
                },
                Undo::HistoryRecorded(account_id) => {
                    if let Some(entries) = self.history.get_mut(&account_id) {
                        entries.pop();
                    }
                }
            }
        }
    }

    /// Applies `events` in order, honouring linked chains.
    ///
    /// A chain starts at a linked event and ends at the first event without
    /// the linked flag. If any event of a chain fails, its effects are rolled
    /// back and every other event of the chain reports `LinkedEventFailed`.
    fn execute_chained<E, R: ChainOutcome>(
        &mut self,
        events: &[E],
        is_linked: impl Fn(&E) -> bool,
        mut apply: impl FnMut(&mut Self, &E, &mut Vec<Undo>) -> R,
    ) -> Vec<EventResult<R>> {
        let mut outcomes: Vec<R> = Vec::with_capacity(events.len());
        let mut journal = Vec::new();
        let mut chain_start: Option<usize> = None;
        let mut chain_failed = false;

        for (index, event) in events.iter().enumerate() {
            let linked = is_linked(event);
            if chain_start.is_none() && linked {
                chain_start = Some(index);
                chain_failed = false;
            }

            let outcome = if linked && index + 1 == events.len() {
                R::LINKED_EVENT_CHAIN_OPEN
            } else if chain_failed {
                R::LINKED_EVENT_FAILED
            } else {
                apply(self, event, &mut journal)
            };

            if let Some(start) = chain_start {
                if outcome != R::OK && !chain_failed {
                    chain_failed = true;
                    self.rollback(&mut journal);
                    for earlier in &mut outcomes[start..] {
                        *earlier = R::LINKED_EVENT_FAILED;
                    }
                }
            }
            outcomes.push(outcome);

            if !linked {
                chain_start = None;
                chain_failed = false;
                journal.clear();
            }
        }

        outcomes
            .into_iter()
            .enumerate()
            .filter(|(_, outcome)| *outcome != R::OK)
            .map(|(index, outcome)| EventResult::new(index as u32, outcome))
            .collect()
    }

    fn create_account(&mut self, a: &Account, journal: &mut Vec<Undo>) -> CreateAccountResult {
        use CreateAccountResult as R;

        if a.timestamp != 0 {
            return R::TimestampMustBeZero;
        }
        if a.id == 0 {
            return R::IdMustNotBeZero;
        }
        if a.id == u128::MAX {
            return R::IdMustNotBeIntMax;
        }
        if a.flags.debits_must_not_exceed_credits && a.flags.credits_must_not_exceed_debits {
            return R::FlagsAreMutuallyExclusive;
        }
        if a.debits_pending != 0 {
            return R::DebitsPendingMustBeZero;
        }
        if a.debits_posted != 0 {
            return R::DebitsPostedMustBeZero;
        }
        if a.credits_pending != 0 {
            return R::CreditsPendingMustBeZero;
        }
        if a.credits_posted != 0 {
            return R::CreditsPostedMustBeZero;
        }
        if a.ledger == 0 {
            return R::LedgerMustNotBeZero;
        }
        if a.code == 0 {
            return R::CodeMustNotBeZero;
        }
        if let Some(existing) = self.accounts.get(&a.id) {
            return account_exists(a, existing);
        }

        let mut account = a.clone();
        account.timestamp = self.next_timestamp();
        self.accounts.insert(account.id, account);
        journal.push(Undo::AccountCreated(a.id));
        R::Ok
    }

    fn create_transfer(&mut self, t: &Transfer, journal: &mut Vec<Undo>) -> CreateTransferResult {
        use CreateTransferResult as R;

        if t.timestamp != 0 {
            return R::TimestampMustBeZero;
        }
        if t.id == 0 {
            return R::IdMustNotBeZero;
        }
        if t.id == u128::MAX {
            return R::IdMustNotBeIntMax;
        }
        if t.flags.are_mutually_exclusive() {
            return R::FlagsAreMutuallyExclusive;
        }
        if t.flags.resolves_pending() {
            return self.resolve_pending(t, journal);
        }

        if t.debit_account_id == 0 {
            return R::DebitAccountIdMustNotBeZero;
        }
        if t.debit_account_id == u128::MAX {
            return R::DebitAccountIdMustNotBeIntMax;
        }
        if t.credit_account_id == 0 {
            return R::CreditAccountIdMustNotBeZero;
        }
        if t.credit_account_id == u128::MAX {
            return R::CreditAccountIdMustNotBeIntMax;
        }
        if t.debit_account_id == t.credit_account_id {
            return R::AccountsMustBeDifferent;
        }
        if t.pending_id != 0 {
            return R::PendingIdMustBeZero;
        }
        if !t.flags.pending && t.timeout != 0 {
            return R::TimeoutReservedForPendingTransfer;
        }
        if t.ledger == 0 {
            return R::LedgerMustNotBeZero;
        }
        if t.code == 0 {
            return R::CodeMustNotBeZero;
        }

        let Some(dr) = self.accounts.get(&t.debit_account_id).cloned() else {
            return R::DebitAccountNotFound;
        };
        let Some(cr) = self.accounts.get(&t.credit_account_id).cloned() else {
            return R::CreditAccountNotFound;
        };
        if dr.ledger != cr.ledger {
            return R::AccountsMustHaveTheSameLedger;
        }
        if t.ledger != dr.ledger {
            return R::TransferMustHaveTheSameLedgerAsAccounts;
        }
        if let Some(existing) = self.transfer(t.id) {
            return transfer_exists(t, existing);
        }

        let mut amount = t.amount;
        if t.flags.balancing_debit {
            let available = dr
                .credits_posted
                .saturating_sub(dr.debits_posted.saturating_add(dr.debits_pending));
            amount = amount.min(available);
        }
        if t.flags.balancing_credit {
            let available = cr
                .debits_posted
                .saturating_sub(cr.credits_posted.saturating_add(cr.credits_pending));
            amount = amount.min(available);
        }

        let mut dr_next = dr.clone();
        let mut cr_next = cr.clone();
        let (debits, credits) = if t.flags.pending {
            (&mut dr_next.debits_pending, &mut cr_next.credits_pending)
        } else {
            (&mut dr_next.debits_posted, &mut cr_next.credits_posted)
        };
        match debits.checked_add(amount) {
            Some(total) => *debits = total,
            None => return R::OverflowsDebits,
        }
        match credits.checked_add(amount) {
            Some(total) => *credits = total,
            None => return R::OverflowsCredits,
        }

        let Some(dr_debits) = dr_next.debits_pending.checked_add(dr_next.debits_posted) else {
            return R::OverflowsDebits;
        };
        let Some(cr_credits) = cr_next.credits_pending.checked_add(cr_next.credits_posted) else {
            return R::OverflowsCredits;
        };
        if dr.flags.debits_must_not_exceed_credits && dr_debits > dr_next.credits_posted {
            return R::ExceedsCredits;
        }
        if cr.flags.credits_must_not_exceed_debits && cr_credits > cr_next.debits_posted {
            return R::ExceedsDebits;
        }

        let mut stored = t.clone();
        stored.amount = amount;
        stored.timestamp = self.next_timestamp();
        self.commit_transfer(stored, dr, dr_next, cr, cr_next, journal);

        if t.flags.pending {
            self.pending.insert(t.id, PendingStatus::Pending);
            journal.push(Undo::PendingStatus {
                id: t.id,
                previous: None,
            });
        }
        R::Ok
    }

    /// Posts or voids an earlier pending transfer.
    fn resolve_pending(&mut self, t: &Transfer, journal: &mut Vec<Undo>) -> CreateTransferResult {
        use CreateTransferResult as R;

        if t.pending_id == 0 {
            return R::PendingIdMustNotBeZero;
        }
        if t.pending_id == u128::MAX {
            return R::PendingIdMustNotBeIntMax;
        }
        if t.pending_id == t.id {
            return R::PendingIdMustBeDifferent;
        }
        if t.timeout != 0 {
            return R::TimeoutReservedForPendingTransfer;
        }

        let Some(p) = self.transfer(t.pending_id).cloned() else {
            return R::PendingTransferNotFound;
        };
        if !p.flags.pending {
            return R::PendingTransferNotPending;
        }
        if t.debit_account_id != 0 && t.debit_account_id != p.debit_account_id {
            return R::PendingTransferHasDifferentDebitAccountId;
        }
        if t.credit_account_id != 0 && t.credit_account_id != p.credit_account_id {
            return R::PendingTransferHasDifferentCreditAccountId;
        }
        if t.ledger != 0 && t.ledger != p.ledger {
            return R::PendingTransferHasDifferentLedger;
        }
        if t.code != 0 && t.code != p.code {
            return R::PendingTransferHasDifferentCode;
        }

        // Zero means "the full pending amount".
        let amount = if t.amount == 0 { p.amount } else { t.amount };
        if t.flags.void_pending_transfer && amount != p.amount {
            return R::PendingTransferHasDifferentAmount;
        }
        if amount > p.amount {
            return R::ExceedsPendingTransferAmount;
        }
        if let Some(existing) = self.transfer(t.id) {
            return transfer_exists(t, existing);
        }
        let previous_status = self.pending.get(&p.id).copied();
        match previous_status {
            Some(PendingStatus::Posted) => return R::PendingTransferAlreadyPosted,
            Some(PendingStatus::Voided) => return R::PendingTransferAlreadyVoided,
            _ => {}
        }

        let Some(dr) = self.accounts.get(&p.debit_account_id).cloned() else {
            return R::DebitAccountNotFound;
        };
        let Some(cr) = self.accounts.get(&p.credit_account_id).cloned() else {
            return R::CreditAccountNotFound;
        };

        let mut dr_next = dr.clone();
        let mut cr_next = cr.clone();
        dr_next.debits_pending = dr_next.debits_pending.saturating_sub(p.amount);
        cr_next.credits_pending = cr_next.credits_pending.saturating_sub(p.amount);
        if t.flags.post_pending_transfer {
            let Some(debits) = dr_next.debits_posted.checked_add(amount) else {
                return R::OverflowsDebits;
            };
            let Some(credits) = cr_next.credits_posted.checked_add(amount) else {
                return R::OverflowsCredits;
            };
            dr_next.debits_posted = debits;
            cr_next.credits_posted = credits;
        }

        let stored = Transfer {
            id: t.id,
            debit_account_id: p.debit_account_id,
            credit_account_id: p.credit_account_id,
            amount,
            pending_id: p.id,
            user_data_128: non_zero_or(t.user_data_128, p.user_data_128),
            user_data_64: non_zero_or(t.user_data_64, p.user_data_64),
            user_data_32: non_zero_or(t.user_data_32, p.user_data_32),
            timeout: 0,
            ledger: p.ledger,
            code: p.code,
            flags: t.flags,
            timestamp: self.next_timestamp(),
        };
        self.commit_transfer(stored, dr, dr_next, cr, cr_next, journal);

        let status = if t.flags.post_pending_transfer {
            PendingStatus::Posted
        } else {
            PendingStatus::Voided
        };
        self.pending.insert(p.id, status);
        journal.push(Undo::PendingStatus {
            id: p.id,
            previous: previous_status,
        });
        R::Ok
    }

    fn commit_transfer(
        &mut self,
        stored: Transfer,
        dr: Account,
        dr_next: Account,
        cr: Account,
        cr_next: Account,
        journal: &mut Vec<Undo>,
    ) {
        journal.push(Undo::AccountChanged(dr));
        journal.push(Undo::AccountChanged(cr));

        for (account, debit) in [(&dr_next, true), (&cr_next, false)] {
            if account.flags.history {
                self.history
                    .entry(account.id)
                    .or_default()
                    .push(HistoryEntry {
                        balance: account.balance_at(stored.timestamp),
                        debit,
                    });
                journal.push(Undo::HistoryRecorded(account.id));
            }
        }

        self.accounts.insert(dr_next.id, dr_next);
        self.accounts.insert(cr_next.id, cr_next);

        let id = stored.id;
        self.transfer_index.insert(id, self.transfers.len());
        self.transfers.push(stored);
        journal.push(Undo::TransferCreated(id));
    }
}

fn non_zero_or<T: Default + PartialEq>(value: T, fallback: T) -> T {
    if value == T::default() {
        fallback
    } else {
        value
    }
}

fn account_exists(a: &Account, e: &Account) -> CreateAccountResult {
    use CreateAccountResult as R;

    if a.flags != e.flags {
        R::ExistsWithDifferentFlags
    } else if a.user_data_128 != e.user_data_128 {
        R::ExistsWithDifferentUserData128
    } else if a.user_data_64 != e.user_data_64 {
        R::ExistsWithDifferentUserData64
    } else if a.user_data_32 != e.user_data_32 {
        R::ExistsWithDifferentUserData32
    } else if a.ledger != e.ledger {
        R::ExistsWithDifferentLedger
    } else if a.code != e.code {
        R::ExistsWithDifferentCode
    } else {
        R::Exists
    }
}

/// Compares a resubmitted transfer with the stored one.
///
/// Fields the ledger fills in itself (accounts and amount of post/void
/// transfers, clamped balancing amounts) are only compared when the
/// resubmission sets them.
fn transfer_exists(t: &Transfer, e: &Transfer) -> CreateTransferResult {
    use CreateTransferResult as R;

    let resolves = t.flags.resolves_pending();
    let balancing = t.flags.balancing_debit || t.flags.balancing_credit;

    if t.flags != e.flags {
        R::ExistsWithDifferentFlags
    } else if (!resolves || t.debit_account_id != 0) && t.debit_account_id != e.debit_account_id
    {
        R::ExistsWithDifferentDebitAccountId
    } else if (!resolves || t.credit_account_id != 0)
        && t.credit_account_id != e.credit_account_id
    {
        R::ExistsWithDifferentCreditAccountId
    } else if !balancing && (!resolves || t.amount != 0) && t.amount != e.amount {
        R::ExistsWithDifferentAmount
    } else if t.pending_id != e.pending_id {
        R::ExistsWithDifferentPendingId
    } else if (!resolves || t.user_data_128 != 0) && t.user_data_128 != e.user_data_128 {
        R::ExistsWithDifferentUserData128
    } else if (!resolves || t.user_data_64 != 0) && t.user_data_64 != e.user_data_64 {
        R::ExistsWithDifferentUserData64
    } else if (!resolves || t.user_data_32 != 0) && t.user_data_32 != e.user_data_32 {
        R::ExistsWithDifferentUserData32
    } else if t.timeout != e.timeout {
        R::ExistsWithDifferentTimeout
    } else if (!resolves || t.code != 0) && t.code != e.code {
        R::ExistsWithDifferentCode
    } else {
        R::Exists
    }
}

fn check_batch_size(count: usize) -> LedgerResult<()> {
    if count > MAX_BATCH_EVENTS {
        return Err(LedgerError::TooManyEvents {
            count,
            max: MAX_BATCH_EVENTS,
        });
    }
    Ok(())
}

/// In-memory implementation of [`Ledger`].
///
/// Intended for tests and single-process deployments; nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    /// Creates an empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    #[instrument(skip(self, accounts), fields(count = accounts.len()))]
    async fn create_accounts(
        &self,
        accounts: Vec<Account>,
    ) -> LedgerResult<Vec<CreateAccountsResult>> {
        check_batch_size(accounts.len())?;

        let mut state = self.state.write().await;
        let results =
            state.execute_chained(&accounts, |a| a.flags.linked, LedgerState::create_account);
        debug!(rejected = results.len(), "accounts batch applied");
        Ok(results)
    }

    #[instrument(skip(self, transfers), fields(count = transfers.len()))]
    async fn create_transfers(
        &self,
        transfers: Vec<Transfer>,
    ) -> LedgerResult<Vec<CreateTransfersResult>> {
        check_batch_size(transfers.len())?;

        let mut state = self.state.write().await;
        let results =
            state.execute_chained(&transfers, |t| t.flags.linked, LedgerState::create_transfer);
        debug!(rejected = results.len(), "transfers batch applied");
        Ok(results)
    }

    async fn lookup_accounts(&self, ids: &[u128]) -> LedgerResult<Vec<Account>> {
        check_batch_size(ids.len())?;

        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.accounts.get(id).cloned())
            .collect())
    }

    async fn lookup_transfers(&self, ids: &[u128]) -> LedgerResult<Vec<Transfer>> {
        check_batch_size(ids.len())?;

        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.transfer(*id).cloned())
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_account_transfers(&self, filter: &AccountFilter) -> LedgerResult<Vec<Transfer>> {
        if !filter.is_satisfiable() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let id = filter.account_id;
        let matches = state
            .transfers
            .iter()
            .filter(|t| {
                (filter.flags.debits && t.debit_account_id == id)
                    || (filter.flags.credits && t.credit_account_id == id)
            })
            .filter(|t| filter.contains_timestamp(t.timestamp));

        let limit = filter.limit as usize;
        let transfers = if filter.flags.reversed {
            matches.rev().take(limit).cloned().collect()
        } else {
            matches.take(limit).cloned().collect()
        };
        Ok(transfers)
    }

    #[instrument(skip(self))]
    async fn get_account_balances(
        &self,
        filter: &AccountFilter,
    ) -> LedgerResult<Vec<AccountBalance>> {
        if !filter.is_satisfiable() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let Some(entries) = state.history.get(&filter.account_id) else {
            return Ok(Vec::new());
        };
        let matches = entries
            .iter()
            .filter(|e| (filter.flags.debits && e.debit) || (filter.flags.credits && !e.debit))
            .filter(|e| filter.contains_timestamp(e.balance.timestamp));

        let limit = filter.limit as usize;
        let balances = if filter.flags.reversed {
            matches.rev().take(limit).map(|e| e.balance.clone()).collect()
        } else {
            matches.take(limit).map(|e| e.balance.clone()).collect()
        };
        Ok(balances)
    }
}
