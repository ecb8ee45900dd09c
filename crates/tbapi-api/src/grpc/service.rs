//! gRPC service implementation for the ledger gateway.

use std::sync::Arc;

use tbapi_ledger::{Ledger, LedgerError};
use tbapi_server::buffer::BufferConfigError;
use tbapi_server::config::BufferSettings;
use tbapi_server::{CreateTransfersError, TransferWriter};
use tonic::{Request, Response, Status};
use tracing::debug;

use super::converters::{
    account_balance_to_proto, account_filter_from_proto, account_from_proto, account_to_proto,
    event_result_to_proto, transfer_from_proto, transfer_to_proto, ConvertError,
};
use crate::ids::{format_id, parse_ids, IdGenerator};
use crate::proto::tbapi::v1::{
    tiger_beetle_server::TigerBeetle, AccountFilter, CreateAccountsReply, CreateAccountsRequest,
    CreateTransfersReply, CreateTransfersRequest, GetAccountBalancesReply,
    GetAccountBalancesRequest, GetAccountTransfersReply, GetAccountTransfersRequest, GetIdReply,
    GetIdRequest, LookupAccountsReply, LookupAccountsRequest, LookupTransfersReply,
    LookupTransfersRequest,
};

const NO_ACCOUNTS: &str = "no accounts were specified";
const NO_TRANSFERS: &str = "no transfers were specified";

/// gRPC service in front of a [`Ledger`].
///
/// `CreateTransfers` goes through a [`TransferWriter`], which coalesces
/// concurrent requests into one ledger call when buffering is enabled. All
/// other operations call the ledger directly.
pub struct TigerBeetleService<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    transfers: Arc<TransferWriter<L>>,
    ids: IdGenerator,
}

impl<L: Ledger + ?Sized> TigerBeetleService<L> {
    pub fn new(ledger: Arc<L>, buffer: &BufferSettings) -> Result<Self, BufferConfigError> {
        let transfers = TransferWriter::new(Arc::clone(&ledger), buffer)?;
        Ok(Self {
            ledger,
            transfers: Arc::new(transfers),
            ids: IdGenerator::new(),
        })
    }

    /// The transfer writer, for draining it on shutdown.
    pub fn transfer_writer(&self) -> Arc<TransferWriter<L>> {
        Arc::clone(&self.transfers)
    }
}

/// Converts a LedgerError to a tonic Status.
///
/// Downstream failures are logged; clients get a sanitised message.
fn ledger_error_to_status(err: LedgerError) -> Status {
    match err {
        // RESOURCE_EXHAUSTED (8): the batch holds more events than the ledger accepts
        err @ LedgerError::TooManyEvents { .. } => Status::resource_exhausted(err.to_string()),
        LedgerError::InvalidInput { message } => Status::invalid_argument(message),
        LedgerError::Unavailable { message } => {
            tracing::error!(error = %message, "Ledger unavailable");
            Status::unavailable("ledger unavailable")
        }
        LedgerError::Internal { message } => {
            tracing::error!(error = %message, "Internal ledger error");
            Status::internal("internal ledger error")
        }
    }
}

fn create_transfers_error_to_status(err: CreateTransfersError) -> Status {
    match err {
        CreateTransfersError::Empty => Status::invalid_argument(NO_TRANSFERS),
        err @ CreateTransfersError::TooMany { .. } => Status::invalid_argument(err.to_string()),
        CreateTransfersError::Ledger(err) => ledger_error_to_status(err),
        CreateTransfersError::Buffer(message) => {
            tracing::error!(error = %message, "Write buffer failed to deliver a result");
            Status::internal("internal error while creating transfers")
        }
    }
}

fn require_filter(filter: Option<AccountFilter>) -> Result<AccountFilter, Status> {
    match filter {
        Some(filter) if !filter.account_id.is_empty() => Ok(filter),
        _ => Err(Status::invalid_argument(NO_ACCOUNTS)),
    }
}

#[tonic::async_trait]
impl<L: Ledger + ?Sized> TigerBeetle for TigerBeetleService<L> {
    async fn get_id(
        &self,
        _request: Request<GetIdRequest>,
    ) -> Result<Response<GetIdReply>, Status> {
        Ok(Response::new(GetIdReply {
            id: format_id(self.ids.generate()),
        }))
    }

    async fn create_accounts(
        &self,
        request: Request<CreateAccountsRequest>,
    ) -> Result<Response<CreateAccountsReply>, Status> {
        let req = request.into_inner();
        if req.accounts.is_empty() {
            return Err(Status::invalid_argument(NO_ACCOUNTS));
        }

        let accounts = req
            .accounts
            .into_iter()
            .map(account_from_proto)
            .collect::<Result<Vec<_>, _>>()?;

        let results = self
            .ledger
            .create_accounts(accounts)
            .await
            .map_err(ledger_error_to_status)?;

        Ok(Response::new(CreateAccountsReply {
            results: results.iter().map(event_result_to_proto).collect(),
        }))
    }

    async fn create_transfers(
        &self,
        request: Request<CreateTransfersRequest>,
    ) -> Result<Response<CreateTransfersReply>, Status> {
        let req = request.into_inner();
        if req.transfers.is_empty() {
            return Err(Status::invalid_argument(NO_TRANSFERS));
        }

        let transfers = req
            .transfers
            .into_iter()
            .map(transfer_from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        let count = transfers.len();

        let results = self
            .transfers
            .create_transfers(transfers)
            .await
            .map_err(create_transfers_error_to_status)?;

        debug!(count, rejected = results.len(), "transfers created");
        Ok(Response::new(CreateTransfersReply {
            results: results.iter().map(event_result_to_proto).collect(),
        }))
    }

    async fn lookup_accounts(
        &self,
        request: Request<LookupAccountsRequest>,
    ) -> Result<Response<LookupAccountsReply>, Status> {
        let req = request.into_inner();
        if req.account_ids.is_empty() {
            return Err(Status::invalid_argument(NO_ACCOUNTS));
        }
        let ids = parse_ids("account_ids", &req.account_ids).map_err(ConvertError::from)?;

        let accounts = self
            .ledger
            .lookup_accounts(&ids)
            .await
            .map_err(ledger_error_to_status)?;

        Ok(Response::new(LookupAccountsReply {
            accounts: accounts
                .into_iter()
                .map(account_to_proto)
                .collect::<Result<_, _>>()?,
        }))
    }

    async fn lookup_transfers(
        &self,
        request: Request<LookupTransfersRequest>,
    ) -> Result<Response<LookupTransfersReply>, Status> {
        let req = request.into_inner();
        if req.transfer_ids.is_empty() {
            return Err(Status::invalid_argument(NO_TRANSFERS));
        }
        let ids = parse_ids("transfer_ids", &req.transfer_ids).map_err(ConvertError::from)?;

        let transfers = self
            .ledger
            .lookup_transfers(&ids)
            .await
            .map_err(ledger_error_to_status)?;

        Ok(Response::new(LookupTransfersReply {
            transfers: transfers
                .into_iter()
                .map(transfer_to_proto)
                .collect::<Result<_, _>>()?,
        }))
    }

    async fn get_account_transfers(
        &self,
        request: Request<GetAccountTransfersRequest>,
    ) -> Result<Response<GetAccountTransfersReply>, Status> {
        let filter = account_filter_from_proto(require_filter(request.into_inner().filter)?)?;

        let transfers = self
            .ledger
            .get_account_transfers(&filter)
            .await
            .map_err(ledger_error_to_status)?;

        Ok(Response::new(GetAccountTransfersReply {
            transfers: transfers
                .into_iter()
                .map(transfer_to_proto)
                .collect::<Result<_, _>>()?,
        }))
    }

    async fn get_account_balances(
        &self,
        request: Request<GetAccountBalancesRequest>,
    ) -> Result<Response<GetAccountBalancesReply>, Status> {
        let filter = account_filter_from_proto(require_filter(request.into_inner().filter)?)?;

        let balances = self
            .ledger
            .get_account_balances(&filter)
            .await
            .map_err(ledger_error_to_status)?;

        Ok(Response::new(GetAccountBalancesReply {
            account_balances: balances
                .into_iter()
                .map(account_balance_to_proto)
                .collect::<Result<_, _>>()?,
        }))
    }
}
