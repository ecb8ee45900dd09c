//! Account and transfer records.
//!
//! All identifiers and amounts are 128-bit unsigned integers. Zero and
//! `u128::MAX` are reserved and never valid identifiers.

/// Account flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountFlags {
    /// Links this event with the next one in the same batch.
    pub linked: bool,
    /// Rejects transfers that would make debits exceed credits.
    pub debits_must_not_exceed_credits: bool,
    /// Rejects transfers that would make credits exceed debits.
    pub credits_must_not_exceed_debits: bool,
    /// Records a balance snapshot for every transfer touching the account.
    pub history: bool,
}

impl AccountFlags {
    const LINKED: u16 = 1 << 0;
    const DEBITS_MUST_NOT_EXCEED_CREDITS: u16 = 1 << 1;
    const CREDITS_MUST_NOT_EXCEED_DEBITS: u16 = 1 << 2;
    const HISTORY: u16 = 1 << 3;

    /// Encodes the flags as their bit representation.
    pub fn bits(&self) -> u16 {
        let mut bits = 0;
        if self.linked {
            bits |= Self::LINKED;
        }
        if self.debits_must_not_exceed_credits {
            bits |= Self::DEBITS_MUST_NOT_EXCEED_CREDITS;
        }
        if self.credits_must_not_exceed_debits {
            bits |= Self::CREDITS_MUST_NOT_EXCEED_DEBITS;
        }
        if self.history {
            bits |= Self::HISTORY;
        }
        bits
    }

    /// Decodes flags from their bit representation. Unknown bits are ignored.
    pub fn from_bits(bits: u16) -> Self {
        Self {
            linked: bits & Self::LINKED != 0,
            debits_must_not_exceed_credits: bits & Self::DEBITS_MUST_NOT_EXCEED_CREDITS != 0,
            credits_must_not_exceed_debits: bits & Self::CREDITS_MUST_NOT_EXCEED_DEBITS != 0,
            history: bits & Self::HISTORY != 0,
        }
    }
}

/// Transfer flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferFlags {
    pub linked: bool,
    /// Reserves the amount in the pending balances instead of posting it.
    pub pending: bool,
    /// Posts a previously reserved pending transfer.
    pub post_pending_transfer: bool,
    /// Releases a previously reserved pending transfer.
    pub void_pending_transfer: bool,
    /// Clamps the amount to what the debit account can still cover.
    pub balancing_debit: bool,
    /// Clamps the amount to what the credit account can still take.
    pub balancing_credit: bool,
}

impl TransferFlags {
    const LINKED: u16 = 1 << 0;
    const PENDING: u16 = 1 << 1;
    const POST_PENDING_TRANSFER: u16 = 1 << 2;
    const VOID_PENDING_TRANSFER: u16 = 1 << 3;
    const BALANCING_DEBIT: u16 = 1 << 4;
    const BALANCING_CREDIT: u16 = 1 << 5;

    pub fn bits(&self) -> u16 {
        let mut bits = 0;
        if self.linked {
            bits |= Self::LINKED;
        }
        if self.pending {
            bits |= Self::PENDING;
        }
        if self.post_pending_transfer {
            bits |= Self::POST_PENDING_TRANSFER;
        }
        if self.void_pending_transfer {
            bits |= Self::VOID_PENDING_TRANSFER;
        }
        if self.balancing_debit {
            bits |= Self::BALANCING_DEBIT;
        }
        if self.balancing_credit {
            bits |= Self::BALANCING_CREDIT;
        }
        bits
    }

    pub fn from_bits(bits: u16) -> Self {
        Self {
            linked: bits & Self::LINKED != 0,
            pending: bits & Self::PENDING != 0,
            post_pending_transfer: bits & Self::POST_PENDING_TRANSFER != 0,
            void_pending_transfer: bits & Self::VOID_PENDING_TRANSFER != 0,
            balancing_debit: bits & Self::BALANCING_DEBIT != 0,
            balancing_credit: bits & Self::BALANCING_CREDIT != 0,
        }
    }

    /// True when the transfer resolves an earlier pending transfer.
    pub fn resolves_pending(&self) -> bool {
        self.post_pending_transfer || self.void_pending_transfer
    }

    /// At most one of pending, post and void may be set.
    pub(crate) fn are_mutually_exclusive(&self) -> bool {
        [
            self.pending,
            self.post_pending_transfer,
            self.void_pending_transfer,
        ]
        .iter()
        .filter(|set| **set)
        .count()
            > 1
    }
}

/// Flags selecting which side of an account a query looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountFilterFlags {
    /// Include transfers where the account is debited.
    pub debits: bool,
    /// Include transfers where the account is credited.
    pub credits: bool,
    /// Return results newest first.
    pub reversed: bool,
}

impl AccountFilterFlags {
    const DEBITS: u32 = 1 << 0;
    const CREDITS: u32 = 1 << 1;
    const REVERSED: u32 = 1 << 2;

    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.debits {
            bits |= Self::DEBITS;
        }
        if self.credits {
            bits |= Self::CREDITS;
        }
        if self.reversed {
            bits |= Self::REVERSED;
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            debits: bits & Self::DEBITS != 0,
            credits: bits & Self::CREDITS != 0,
            reversed: bits & Self::REVERSED != 0,
        }
    }
}

/// A ledger account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub id: u128,
    pub debits_pending: u128,
    pub debits_posted: u128,
    pub credits_pending: u128,
    pub credits_posted: u128,
    pub user_data_128: u128,
    pub user_data_64: u64,
    pub user_data_32: u32,
    pub ledger: u32,
    pub code: u16,
    pub flags: AccountFlags,
    /// Assigned by the ledger; must be zero on creation.
    pub timestamp: u64,
}

impl Account {
    pub(crate) fn balance_at(&self, timestamp: u64) -> AccountBalance {
        AccountBalance {
            debits_pending: self.debits_pending,
            debits_posted: self.debits_posted,
            credits_pending: self.credits_pending,
            credits_posted: self.credits_posted,
            timestamp,
        }
    }
}

/// A transfer between two accounts of the same ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfer {
    pub id: u128,
    pub debit_account_id: u128,
    pub credit_account_id: u128,
    pub amount: u128,
    /// For post/void transfers: the pending transfer being resolved.
    pub pending_id: u128,
    pub user_data_128: u128,
    pub user_data_64: u64,
    pub user_data_32: u32,
    /// Seconds until a pending transfer expires; zero means never.
    pub timeout: u32,
    pub ledger: u32,
    pub code: u16,
    pub flags: TransferFlags,
    /// Assigned by the ledger; must be zero on creation.
    pub timestamp: u64,
}

/// Account balances at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountBalance {
    pub debits_pending: u128,
    pub debits_posted: u128,
    pub credits_pending: u128,
    pub credits_posted: u128,
    pub timestamp: u64,
}

/// Query over the transfers or balance history of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub account_id: u128,
    /// Inclusive lower bound; zero means unbounded.
    pub timestamp_min: u64,
    /// Inclusive upper bound; zero means unbounded.
    pub timestamp_max: u64,
    /// Maximum number of results; zero yields nothing.
    pub limit: u32,
    pub flags: AccountFilterFlags,
}

impl AccountFilter {
    /// True when the filter can match anything at all.
    pub(crate) fn is_satisfiable(&self) -> bool {
        self.account_id != 0
            && self.account_id != u128::MAX
            && self.limit != 0
            && (self.flags.debits || self.flags.credits)
            && (self.timestamp_max == 0 || self.timestamp_min <= self.timestamp_max)
    }

    pub(crate) fn contains_timestamp(&self, timestamp: u64) -> bool {
        let max = if self.timestamp_max == 0 {
            u64::MAX
        } else {
            self.timestamp_max
        };
        timestamp >= self.timestamp_min && timestamp <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_flags_bits() {
        let flags = AccountFlags {
            linked: true,
            history: true,
            ..Default::default()
        };
        assert_eq!(flags.bits(), 0b1001);
        assert_eq!(AccountFlags::from_bits(0b1001), flags);
        assert_eq!(AccountFlags::from_bits(0), AccountFlags::default());
    }

    #[test]
    fn test_transfer_flags_bits() {
        let flags = TransferFlags {
            pending: true,
            balancing_credit: true,
            ..Default::default()
        };
        assert_eq!(flags.bits(), 0b10_0010);
        assert_eq!(TransferFlags::from_bits(flags.bits()), flags);
    }

    #[test]
    fn test_transfer_flags_mutual_exclusion() {
        let ok = TransferFlags {
            pending: true,
            ..Default::default()
        };
        assert!(!ok.are_mutually_exclusive());

        let bad = TransferFlags {
            pending: true,
            void_pending_transfer: true,
            ..Default::default()
        };
        assert!(bad.are_mutually_exclusive());
        assert!(bad.resolves_pending());
    }

    #[test]
    fn test_filter_satisfiability() {
        let filter = AccountFilter {
            account_id: 1,
            limit: 10,
            flags: AccountFilterFlags {
                debits: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(filter.is_satisfiable());

        assert!(!AccountFilter {
            limit: 0,
            ..filter.clone()
        }
        .is_satisfiable());
        assert!(!AccountFilter {
            flags: AccountFilterFlags::default(),
            ..filter.clone()
        }
        .is_satisfiable());
        assert!(!AccountFilter {
            timestamp_min: 10,
            timestamp_max: 5,
            ..filter
        }
        .is_satisfiable());
    }

    #[test]
    fn test_filter_timestamp_bounds() {
        let filter = AccountFilter {
            timestamp_min: 5,
            timestamp_max: 0,
            ..Default::default()
        };
        assert!(!filter.contains_timestamp(4));
        assert!(filter.contains_timestamp(5));
        assert!(filter.contains_timestamp(u64::MAX));
    }
}
