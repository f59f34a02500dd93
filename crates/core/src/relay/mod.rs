//! Private relay connection.
//!
//! Messages travel as JSON `{"event": ..., "data": ...}` frames over one websocket.
use std::future::Future;

use alloy::primitives::{Address, B256, Bytes, U256};
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::swap::call::SwapSummary;

mod worker;
pub use worker::{Handle, RelaySender};

/// The signed transactions and swap summary handed to the relay. Built once per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_approve: Option<Bytes>,
    pub serialized_swap: Bytes,
    pub swap: SwapSummary,
    pub bribe: U256,
    pub router_address: Address,
    /// Milliseconds the relay keeps trying before giving up.
    pub ttl: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Pending,
    Confirmed,
    Rejected,
    Failed,
}

impl RelayStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    /// Hash of the swap transaction.
    pub hash: B256,
    pub status: RelayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RelayEvent {
    TransactionRequest {
        hash: B256,
        #[serde(flatten)]
        request: RelayRequest,
    },
    TransactionCancelRequest {
        hash: B256,
    },
    TransactionStatus(TransactionStatus),
}

pub trait RelayTransport: Send + Sync {
    /// Queues `request`, tracked under the locally computed swap `hash`.
    fn emit_transaction_request(
        &self,
        hash: B256,
        request: RelayRequest,
    ) -> impl Future<Output = eyre::Result<()>> + Send;

    fn emit_transaction_cancellation(
        &self,
        hash: B256,
    ) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Status updates for submitted transactions.
    fn subscribe_status(&self) -> broadcast::Receiver<TransactionStatus>;
}

const OUTGOING_CAPACITY: usize = 16;
const STATUS_CAPACITY: usize = 64;

pub struct Builder {
    pub url: String,
    pub shutdown_token: CancellationToken,
}

impl Builder {
    pub fn build(self) -> Handle {
        let Self {
            url,
            shutdown_token,
        } = self;

        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
        let (status_tx, _) = broadcast::channel(STATUS_CAPACITY);

        let worker = worker::Worker {
            url,
            outgoing_rx,
            status_tx: status_tx.clone(),
            shutdown_token: shutdown_token.clone(),
        };
        let worker_handle = tokio::spawn(worker.run());

        Handle::new(
            RelaySender::new(outgoing_tx, status_tx),
            shutdown_token,
            worker_handle,
        )
    }
}
