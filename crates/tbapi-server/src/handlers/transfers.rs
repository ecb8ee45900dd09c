//! Transfer creation through the write buffer.
//!
//! Each request is one buffer item. A flush concatenates the transfers of all
//! requests in the batch, sends them to the ledger in a single call and
//! splits the ledger's sparse results back into per-request results, with
//! indices relative to each request.
//!
//! A request that ends in an unterminated linked chain would otherwise link
//! into the next request of the batch. Such a trailing chain is answered
//! locally, the way the ledger answers an open chain, and never sent.

use std::sync::Arc;

use async_trait::async_trait;
use tbapi_ledger::{
    CreateTransferResult, CreateTransfersResult, EventResult, Ledger, LedgerError, Transfer,
    MAX_BATCH_EVENTS,
};
use tracing::debug;

use crate::buffer::{BufferConfigError, BufferError, BufferStats, Flush, WriteBuffer};
use crate::config::BufferSettings;

/// Errors returned by [`TransferWriter::create_transfers`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateTransfersError {
    #[error("no transfers were specified")]
    Empty,

    #[error("too many transfers in one request: {count} (max {max})")]
    TooMany { count: usize, max: usize },

    /// The ledger rejected the whole batch this request was part of.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The buffer could not deliver a result.
    #[error("write buffer failure: {0}")]
    Buffer(String),
}

impl From<BufferError<LedgerError>> for CreateTransfersError {
    fn from(err: BufferError<LedgerError>) -> Self {
        match err {
            BufferError::Flush(err) => CreateTransfersError::Ledger(err),
            other => CreateTransfersError::Buffer(other.to_string()),
        }
    }
}

/// Flushes batches of transfer requests into one ledger call.
pub struct LedgerTransfers<L: Ledger + ?Sized> {
    ledger: Arc<L>,
}

impl<L: Ledger + ?Sized> LedgerTransfers<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<L: Ledger + ?Sized> Flush<Vec<Transfer>> for LedgerTransfers<L> {
    type Outcome = Vec<CreateTransfersResult>;
    type Error = LedgerError;

    async fn flush(
        &self,
        requests: Vec<Vec<Transfer>>,
    ) -> Result<Vec<Vec<CreateTransfersResult>>, LedgerError> {
        let mut submitted = Vec::with_capacity(requests.len());
        let mut local = Vec::with_capacity(requests.len());
        let mut events = Vec::with_capacity(requests.iter().map(Vec::len).sum());

        for mut request in requests {
            let open = open_chain_start(&request);
            let trailing = request.split_off(open);
            local.push(open_chain_results(open, trailing.len()));
            submitted.push(request.len());
            events.extend(request);
        }

        debug!(
            requests = submitted.len(),
            events = events.len(),
            "submitting coalesced transfers"
        );
        // Every request may have been an open chain
        let results = if events.is_empty() {
            Vec::new()
        } else {
            self.ledger.create_transfers(events).await?
        };

        let mut per_request = split_results(&submitted, results);
        for (results, local) in per_request.iter_mut().zip(local) {
            results.extend(local);
        }
        Ok(per_request)
    }
}

/// Index where a trailing unterminated linked chain starts, or `len` if the
/// request ends cleanly.
fn open_chain_start(transfers: &[Transfer]) -> usize {
    match transfers.last() {
        Some(last) if last.flags.linked => transfers
            .iter()
            .rposition(|t| !t.flags.linked)
            .map_or(0, |i| i + 1),
        _ => transfers.len(),
    }
}

fn open_chain_results(start: usize, len: usize) -> Vec<CreateTransfersResult> {
    (0..len)
        .map(|offset| {
            let result = if offset + 1 == len {
                CreateTransferResult::LinkedEventChainOpen
            } else {
                CreateTransferResult::LinkedEventFailed
            };
            EventResult::new((start + offset) as u32, result)
        })
        .collect()
}

/// Splits sparse results for concatenated requests of the given sizes back
/// into per-request lists, rebasing each index to its request.
fn split_results(
    sizes: &[usize],
    mut results: Vec<CreateTransfersResult>,
) -> Vec<Vec<CreateTransfersResult>> {
    results.sort_by_key(|r| r.index);

    let mut starts = Vec::with_capacity(sizes.len());
    let mut offset = 0usize;
    for size in sizes {
        starts.push(offset);
        offset += size;
    }

    let mut per_request = vec![Vec::new(); sizes.len()];
    for result in results {
        let index = result.index as usize;
        // Last request whose start is at or before the index.
        let request = starts.partition_point(|&start| start <= index).saturating_sub(1);
        if let Some(bucket) = per_request.get_mut(request) {
            bucket.push(EventResult::new(
                (index - starts[request]) as u32,
                result.result,
            ));
        }
    }
    per_request
}

/// Creates transfers, coalescing concurrent requests when buffering is enabled.
pub struct TransferWriter<L: Ledger + ?Sized> {
    buffer: WriteBuffer<Vec<Transfer>, LedgerTransfers<L>>,
}

impl<L: Ledger + ?Sized> TransferWriter<L> {
    pub fn new(ledger: Arc<L>, settings: &BufferSettings) -> Result<Self, BufferConfigError> {
        let buffer = WriteBuffer::from_settings(settings, LedgerTransfers::new(ledger))?;
        Ok(Self { buffer })
    }

    /// Creates the transfers of one request.
    ///
    /// Returns the non-ok results, indexed by position within `transfers`.
    pub async fn create_transfers(
        &self,
        transfers: Vec<Transfer>,
    ) -> Result<Vec<CreateTransfersResult>, CreateTransfersError> {
        if transfers.is_empty() {
            return Err(CreateTransfersError::Empty);
        }
        if transfers.len() > MAX_BATCH_EVENTS {
            return Err(CreateTransfersError::TooMany {
                count: transfers.len(),
                max: MAX_BATCH_EVENTS,
            });
        }

        let flushed = self.buffer.put(transfers).await?;
        Ok(flushed.into_outcome())
    }

    pub fn is_buffered(&self) -> bool {
        self.buffer.is_buffered()
    }

    /// Flushes requests still waiting in the buffer.
    pub async fn flush_pending(&self) {
        self.buffer.flush_pending().await;
    }

    pub fn stats(&self) -> Option<BufferStats> {
        self.buffer.stats()
    }
}
