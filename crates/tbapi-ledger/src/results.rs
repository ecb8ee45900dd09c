//! Per-event result codes.
//!
//! A batch write returns one [`EventResult`] for every event that was *not*
//! applied successfully; events missing from the response succeeded. The
//! `index` of an entry is the event's position in the submitted batch.

use std::fmt;

/// Declares a result-code enum together with its wire name.
macro_rules! result_codes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Wire name of the result, as reported to API clients.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

result_codes! {
    /// Outcome of creating one account.
    pub enum CreateAccountResult {
        Ok => "AccountOK",
        LinkedEventFailed => "AccountLinkedEventFailed",
        LinkedEventChainOpen => "AccountLinkedEventChainOpen",
        TimestampMustBeZero => "AccountTimestampMustBeZero",
        IdMustNotBeZero => "AccountIDMustNotBeZero",
        IdMustNotBeIntMax => "AccountIDMustNotBeIntMax",
        FlagsAreMutuallyExclusive => "AccountFlagsAreMutuallyExclusive",
        DebitsPendingMustBeZero => "AccountDebitsPendingMustBeZero",
        DebitsPostedMustBeZero => "AccountDebitsPostedMustBeZero",
        CreditsPendingMustBeZero => "AccountCreditsPendingMustBeZero",
        CreditsPostedMustBeZero => "AccountCreditsPostedMustBeZero",
        LedgerMustNotBeZero => "AccountLedgerMustNotBeZero",
        CodeMustNotBeZero => "AccountCodeMustNotBeZero",
        ExistsWithDifferentFlags => "AccountExistsWithDifferentFlags",
        ExistsWithDifferentUserData128 => "AccountExistsWithDifferentUserData128",
        ExistsWithDifferentUserData64 => "AccountExistsWithDifferentUserData64",
        ExistsWithDifferentUserData32 => "AccountExistsWithDifferentUserData32",
        ExistsWithDifferentLedger => "AccountExistsWithDifferentLedger",
        ExistsWithDifferentCode => "AccountExistsWithDifferentCode",
        Exists => "AccountExists",
    }
}

result_codes! {
    /// Outcome of creating one transfer.
    pub enum CreateTransferResult {
        Ok => "TransferOK",
        LinkedEventFailed => "TransferLinkedEventFailed",
        LinkedEventChainOpen => "TransferLinkedEventChainOpen",
        TimestampMustBeZero => "TransferTimestampMustBeZero",
        IdMustNotBeZero => "TransferIDMustNotBeZero",
        IdMustNotBeIntMax => "TransferIDMustNotBeIntMax",
        FlagsAreMutuallyExclusive => "TransferFlagsAreMutuallyExclusive",
        DebitAccountIdMustNotBeZero => "TransferDebitAccountIDMustNotBeZero",
        DebitAccountIdMustNotBeIntMax => "TransferDebitAccountIDMustNotBeIntMax",
        CreditAccountIdMustNotBeZero => "TransferCreditAccountIDMustNotBeZero",
        CreditAccountIdMustNotBeIntMax => "TransferCreditAccountIDMustNotBeIntMax",
        AccountsMustBeDifferent => "TransferAccountsMustBeDifferent",
        PendingIdMustBeZero => "TransferPendingIDMustBeZero",
        PendingIdMustNotBeZero => "TransferPendingIDMustNotBeZero",
        PendingIdMustNotBeIntMax => "TransferPendingIDMustNotBeIntMax",
        PendingIdMustBeDifferent => "TransferPendingIDMustBeDifferent",
        TimeoutReservedForPendingTransfer => "TransferTimeoutReservedForPendingTransfer",
        LedgerMustNotBeZero => "TransferLedgerMustNotBeZero",
        CodeMustNotBeZero => "TransferCodeMustNotBeZero",
        DebitAccountNotFound => "TransferDebitAccountNotFound",
        CreditAccountNotFound => "TransferCreditAccountNotFound",
        AccountsMustHaveTheSameLedger => "TransferAccountsMustHaveTheSameLedger",
        TransferMustHaveTheSameLedgerAsAccounts => "TransferTransferMustHaveTheSameLedgerAsAccounts",
        PendingTransferNotFound => "TransferPendingTransferNotFound",
        PendingTransferNotPending => "TransferPendingTransferNotPending",
        PendingTransferHasDifferentDebitAccountId => "TransferPendingTransferHasDifferentDebitAccountID",
        PendingTransferHasDifferentCreditAccountId => "TransferPendingTransferHasDifferentCreditAccountID",
        PendingTransferHasDifferentLedger => "TransferPendingTransferHasDifferentLedger",
        PendingTransferHasDifferentCode => "TransferPendingTransferHasDifferentCode",
        PendingTransferHasDifferentAmount => "TransferPendingTransferHasDifferentAmount",
        ExceedsPendingTransferAmount => "TransferExceedsPendingTransferAmount",
        PendingTransferAlreadyPosted => "TransferPendingTransferAlreadyPosted",
        PendingTransferAlreadyVoided => "TransferPendingTransferAlreadyVoided",
        ExistsWithDifferentFlags => "TransferExistsWithDifferentFlags",
        ExistsWithDifferentDebitAccountId => "TransferExistsWithDifferentDebitAccountID",
        ExistsWithDifferentCreditAccountId => "TransferExistsWithDifferentCreditAccountID",
        ExistsWithDifferentAmount => "TransferExistsWithDifferentAmount",
        ExistsWithDifferentPendingId => "TransferExistsWithDifferentPendingID",
        ExistsWithDifferentUserData128 => "TransferExistsWithDifferentUserData128",
        ExistsWithDifferentUserData64 => "TransferExistsWithDifferentUserData64",
        ExistsWithDifferentUserData32 => "TransferExistsWithDifferentUserData32",
        ExistsWithDifferentTimeout => "TransferExistsWithDifferentTimeout",
        ExistsWithDifferentCode => "TransferExistsWithDifferentCode",
        Exists => "TransferExists",
        OverflowsDebits => "TransferOverflowsDebits",
        OverflowsCredits => "TransferOverflowsCredits",
        ExceedsCredits => "TransferExceedsCredits",
        ExceedsDebits => "TransferExceedsDebits",
    }
}

/// A non-ok outcome for the event at `index` of a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventResult<R> {
    pub index: u32,
    pub result: R,
}

impl<R> EventResult<R> {
    pub fn new(index: u32, result: R) -> Self {
        Self { index, result }
    }
}

/// Result entry returned by `create_accounts`.
pub type CreateAccountsResult = EventResult<CreateAccountResult>;

/// Result entry returned by `create_transfers`.
pub type CreateTransfersResult = EventResult<CreateTransferResult>;

/// Codes shared by every event type that can be linked into chains.
pub(crate) trait ChainOutcome: Copy + PartialEq {
    const OK: Self;
    const LINKED_EVENT_FAILED: Self;
    const LINKED_EVENT_CHAIN_OPEN: Self;
}

impl ChainOutcome for CreateAccountResult {
    const OK: Self = Self::Ok;
    const LINKED_EVENT_FAILED: Self = Self::LinkedEventFailed;
    const LINKED_EVENT_CHAIN_OPEN: Self = Self::LinkedEventChainOpen;
}

impl ChainOutcome for CreateTransferResult {
    const OK: Self = Self::Ok;
    const LINKED_EVENT_FAILED: Self = Self::LinkedEventFailed;
    const LINKED_EVENT_CHAIN_OPEN: Self = Self::LinkedEventChainOpen;
}
