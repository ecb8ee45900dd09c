//! Conversions between protobuf messages and ledger records.

use std::fmt;

use tbapi_ledger as ledger;
use thiserror::Error;
use tonic::Status;

use crate::ids::{format_id, parse_id, IdParseError};
use crate::proto::tbapi::v1 as proto;

/// A message that cannot be represented on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Id(#[from] IdParseError),

    #[error("{field}: value {value} is out of range")]
    OutOfRange { field: &'static str, value: u128 },
}

impl From<ConvertError> for Status {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Id(err) => Status::invalid_argument(err.to_string()),
            err @ ConvertError::OutOfRange { .. } => Status::out_of_range(err.to_string()),
        }
    }
}

fn narrow<T: TryFrom<u128>>(field: &'static str, value: u128) -> Result<T, ConvertError> {
    T::try_from(value).map_err(|_| ConvertError::OutOfRange { field, value })
}

// ===================================
// Proto -> Ledger
// ===================================

fn account_flags_from_proto(flags: Option<proto::AccountFlags>) -> ledger::AccountFlags {
    let flags = flags.unwrap_or_default();
    ledger::AccountFlags {
        linked: flags.linked.unwrap_or(false),
        debits_must_not_exceed_credits: flags.debits_must_not_exceed_credits.unwrap_or(false),
        credits_must_not_exceed_debits: flags.credits_must_not_exceed_debits.unwrap_or(false),
        history: flags.history.unwrap_or(false),
    }
}

fn transfer_flags_from_proto(flags: Option<proto::TransferFlags>) -> ledger::TransferFlags {
    let flags = flags.unwrap_or_default();
    ledger::TransferFlags {
        linked: flags.linked.unwrap_or(false),
        pending: flags.pending.unwrap_or(false),
        post_pending_transfer: flags.post_pending_transfer.unwrap_or(false),
        void_pending_transfer: flags.void_pending_transfer.unwrap_or(false),
        balancing_debit: flags.balancing_debit.unwrap_or(false),
        balancing_credit: flags.balancing_credit.unwrap_or(false),
    }
}

/// Converts an account to create. The timestamp is passed through so the
/// ledger can reject a nonzero one.
pub fn account_from_proto(account: proto::Account) -> Result<ledger::Account, ConvertError> {
    Ok(ledger::Account {
        id: parse_id("id", &account.id)?,
        debits_pending: account.debits_pending.into(),
        debits_posted: account.debits_posted.into(),
        credits_pending: account.credits_pending.into(),
        credits_posted: account.credits_posted.into(),
        user_data_128: parse_id("user_data128", &account.user_data128)?,
        user_data_64: account.user_data64,
        user_data_32: account.user_data32,
        ledger: account.ledger,
        code: narrow("code", account.code.into())?,
        flags: account_flags_from_proto(account.flags),
        timestamp: account.timestamp,
    })
}

pub fn transfer_from_proto(transfer: proto::Transfer) -> Result<ledger::Transfer, ConvertError> {
    let pending_id = match transfer.pending_id.as_deref() {
        Some(id) => parse_id("pending_id", id)?,
        None => 0,
    };

    Ok(ledger::Transfer {
        id: parse_id("id", &transfer.id)?,
        debit_account_id: parse_id("debit_account_id", &transfer.debit_account_id)?,
        credit_account_id: parse_id("credit_account_id", &transfer.credit_account_id)?,
        amount: transfer.amount.into(),
        pending_id,
        user_data_128: parse_id("user_data128", &transfer.user_data128)?,
        user_data_64: transfer.user_data64,
        user_data_32: transfer.user_data32,
        timeout: transfer.timeout,
        ledger: transfer.ledger,
        code: narrow("code", transfer.code.into())?,
        flags: transfer_flags_from_proto(transfer.transfer_flags),
        timestamp: transfer.timestamp,
    })
}

pub fn account_filter_from_proto(
    filter: proto::AccountFilter,
) -> Result<ledger::AccountFilter, ConvertError> {
    let flags = filter.flags.unwrap_or_default();
    Ok(ledger::AccountFilter {
        account_id: parse_id("filter.account_id", &filter.account_id)?,
        timestamp_min: filter.timestamp_min,
        timestamp_max: filter.timestamp_max,
        limit: filter.limit,
        flags: ledger::AccountFilterFlags {
            debits: flags.debits.unwrap_or(false),
            credits: flags.credits.unwrap_or(false),
            reversed: flags.reversed.unwrap_or(false),
        },
    })
}

// ===================================
// Ledger -> Proto
// ===================================

fn account_flags_to_proto(flags: ledger::AccountFlags) -> proto::AccountFlags {
    proto::AccountFlags {
        linked: Some(flags.linked),
        debits_must_not_exceed_credits: Some(flags.debits_must_not_exceed_credits),
        credits_must_not_exceed_debits: Some(flags.credits_must_not_exceed_debits),
        history: Some(flags.history),
    }
}

fn transfer_flags_to_proto(flags: ledger::TransferFlags) -> proto::TransferFlags {
    proto::TransferFlags {
        linked: Some(flags.linked),
        pending: Some(flags.pending),
        post_pending_transfer: Some(flags.post_pending_transfer),
        void_pending_transfer: Some(flags.void_pending_transfer),
        balancing_debit: Some(flags.balancing_debit),
        balancing_credit: Some(flags.balancing_credit),
    }
}

/// Balances are 128-bit in the ledger but `uint64` on the wire.
pub fn account_to_proto(account: ledger::Account) -> Result<proto::Account, ConvertError> {
    Ok(proto::Account {
        id: format_id(account.id),
        debits_pending: narrow("debits_pending", account.debits_pending)?,
        debits_posted: narrow("debits_posted", account.debits_posted)?,
        credits_pending: narrow("credits_pending", account.credits_pending)?,
        credits_posted: narrow("credits_posted", account.credits_posted)?,
        user_data128: format_id(account.user_data_128),
        user_data64: account.user_data_64,
        user_data32: account.user_data_32,
        ledger: account.ledger,
        code: account.code.into(),
        flags: Some(account_flags_to_proto(account.flags)),
        timestamp: account.timestamp,
    })
}

pub fn transfer_to_proto(transfer: ledger::Transfer) -> Result<proto::Transfer, ConvertError> {
    Ok(proto::Transfer {
        id: format_id(transfer.id),
        debit_account_id: format_id(transfer.debit_account_id),
        credit_account_id: format_id(transfer.credit_account_id),
        amount: narrow("amount", transfer.amount)?,
        pending_id: (transfer.pending_id != 0).then(|| format_id(transfer.pending_id)),
        user_data128: format_id(transfer.user_data_128),
        user_data64: transfer.user_data_64,
        user_data32: transfer.user_data_32,
        timeout: transfer.timeout,
        ledger: transfer.ledger,
        code: transfer.code.into(),
        transfer_flags: Some(transfer_flags_to_proto(transfer.flags)),
        timestamp: transfer.timestamp,
    })
}

pub fn account_balance_to_proto(
    balance: ledger::AccountBalance,
) -> Result<proto::AccountBalance, ConvertError> {
    Ok(proto::AccountBalance {
        debits_pending: narrow("debits_pending", balance.debits_pending)?,
        debits_posted: narrow("debits_posted", balance.debits_posted)?,
        credits_pending: narrow("credits_pending", balance.credits_pending)?,
        credits_posted: narrow("credits_posted", balance.credits_posted)?,
        timestamp: balance.timestamp,
    })
}

pub fn event_result_to_proto<R: fmt::Display>(result: &ledger::EventResult<R>) -> proto::EventResult {
    proto::EventResult {
        index: result.index,
        result: result.result.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbapi_ledger::{CreateTransferResult, EventResult};

    fn proto_transfer() -> proto::Transfer {
        proto::Transfer {
            id: "0x10".to_string(),
            debit_account_id: "1".to_string(),
            credit_account_id: "2".to_string(),
            amount: 500,
            ledger: 7,
            code: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_transfer_from_proto() {
        let transfer = transfer_from_proto(proto_transfer()).unwrap();
        assert_eq!(transfer.id, 0x10);
        assert_eq!(transfer.debit_account_id, 1);
        assert_eq!(transfer.credit_account_id, 2);
        assert_eq!(transfer.amount, 500);
        assert_eq!(transfer.pending_id, 0);
        assert_eq!(transfer.user_data_128, 0);
        assert_eq!(transfer.code, 3);
        assert_eq!(transfer.flags, ledger::TransferFlags::default());
    }

    #[test]
    fn test_transfer_flags_from_proto() {
        let mut transfer = proto_transfer();
        transfer.pending_id = Some("abc".to_string());
        transfer.transfer_flags = Some(proto::TransferFlags {
            post_pending_transfer: Some(true),
            linked: Some(false),
            ..Default::default()
        });

        let transfer = transfer_from_proto(transfer).unwrap();
        assert_eq!(transfer.pending_id, 0xabc);
        assert!(transfer.flags.post_pending_transfer);
        assert!(!transfer.flags.linked);
        assert!(!transfer.flags.pending);
    }

    #[test]
    fn test_bad_id_names_field() {
        let mut transfer = proto_transfer();
        transfer.credit_account_id = "not-hex".to_string();

        let err = transfer_from_proto(transfer).unwrap_err();
        assert!(err.to_string().starts_with("credit_account_id:"));

        let status = Status::from(err);
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn test_code_must_fit_sixteen_bits() {
        let mut transfer = proto_transfer();
        transfer.code = 70_000;

        let err = transfer_from_proto(transfer).unwrap_err();
        assert_eq!(
            err,
            ConvertError::OutOfRange {
                field: "code",
                value: 70_000
            }
        );
        assert_eq!(Status::from(err).code(), tonic::Code::OutOfRange);
    }

    #[test]
    fn test_account_round_trip_through_ledger_types() {
        let account = proto::Account {
            id: "ff".to_string(),
            user_data128: "0x2a".to_string(),
            user_data64: 9,
            ledger: 1,
            code: 10,
            flags: Some(proto::AccountFlags {
                history: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let ledger_account = account_from_proto(account).unwrap();
        assert_eq!(ledger_account.user_data_128, 42);
        assert!(ledger_account.flags.history);

        let back = account_to_proto(ledger_account).unwrap();
        assert_eq!(back.id, "ff");
        assert_eq!(back.user_data128, "2a");
        assert_eq!(back.flags.as_ref().and_then(|f| f.history), Some(true));
        assert_eq!(back.flags.as_ref().and_then(|f| f.linked), Some(false));
    }

    #[test]
    fn test_wide_balance_is_out_of_range() {
        let account = ledger::Account {
            id: 1,
            credits_posted: u128::from(u64::MAX) + 1,
            ..Default::default()
        };
        assert!(matches!(
            account_to_proto(account),
            Err(ConvertError::OutOfRange {
                field: "credits_posted",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_pending_id_is_omitted() {
        let transfer = ledger::Transfer {
            id: 5,
            ..Default::default()
        };
        assert_eq!(transfer_to_proto(transfer).unwrap().pending_id, None);

        let transfer = ledger::Transfer {
            id: 6,
            pending_id: 5,
            ..Default::default()
        };
        assert_eq!(
            transfer_to_proto(transfer).unwrap().pending_id.as_deref(),
            Some("5")
        );
    }

    #[test]
    fn test_filter_from_proto() {
        let filter = proto::AccountFilter {
            account_id: "0x1".to_string(),
            limit: 10,
            flags: Some(proto::AccountFilterFlags {
                credits: Some(true),
                reversed: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let filter = account_filter_from_proto(filter).unwrap();
        assert_eq!(filter.account_id, 1);
        assert_eq!(filter.limit, 10);
        assert!(filter.flags.credits && filter.flags.reversed && !filter.flags.debits);
    }

    #[test]
    fn test_event_result_uses_wire_name() {
        let result = EventResult::new(4, CreateTransferResult::Exists);
        let proto = event_result_to_proto(&result);
        assert_eq!(proto.index, 4);
        assert_eq!(proto.result, "TransferExists");
    }
}
