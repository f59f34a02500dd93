//! JSON-RPC surface of the connected wallet.
use std::future::Future;

use alloy::{
    primitives::{Address, B256, Bytes, U256},
    providers::Provider,
    rpc::{client::NoParams, types::TransactionRequest},
    sol_types::{Revert, SolError as _},
    transports::{RpcError, TransportError},
};
use thiserror::Error;

use super::call::IERC20;

/// EIP-1193 user rejection.
const USER_REJECTED_CODE: i64 = 4001;
const METHOD_NOT_FOUND_CODE: i64 = -32601;
const EXECUTION_REVERTED_CODE: i64 = 3;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("user rejected the request")]
    UserRejected,
    #[error("method {0} not supported by wallet")]
    MethodUnsupported(String),
    /// The call reverted. `reason` is the decoded revert string if there was one.
    #[error("execution reverted: {}", reason.as_deref().unwrap_or("no reason"))]
    Reverted { reason: Option<String> },
    #[error("wallet backend error: {0}")]
    Backend(String),
}

pub trait WalletRpc: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64, WalletError>> + Send;

    /// `web3_clientVersion`, used to pick a signing style.
    fn client_version(&self) -> impl Future<Output = Result<String, WalletError>> + Send;

    /// Pending nonce of `address`.
    fn transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, WalletError>> + Send;

    fn estimate_gas(
        &self,
        tx: &TransactionRequest,
    ) -> impl Future<Output = Result<u64, WalletError>> + Send;

    /// Static call simulation.
    fn call(
        &self,
        tx: &TransactionRequest,
    ) -> impl Future<Output = Result<Bytes, WalletError>> + Send;

    fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> impl Future<Output = Result<U256, WalletError>> + Send;

    /// Signs a raw 32-byte hash with `eth_sign`.
    fn eth_sign(
        &self,
        address: Address,
        hash: B256,
    ) -> impl Future<Output = Result<Bytes, WalletError>> + Send;

    /// Signs a fully populated transaction, returning its EIP-2718 encoding.
    fn eth_sign_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> impl Future<Output = Result<Bytes, WalletError>> + Send;
}

/// [`WalletRpc`] over any alloy provider connected to a wallet-capable node.
#[derive(Debug, Clone)]
pub struct ProviderWallet<P> {
    provider: P,
}

impl<P> ProviderWallet<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: Provider + Clone> WalletRpc for ProviderWallet<P> {
    async fn chain_id(&self) -> Result<u64, WalletError> {
        self.provider.get_chain_id().await.map_err(wallet_error)
    }

    async fn client_version(&self) -> Result<String, WalletError> {
        self.provider
            .raw_request("web3_clientVersion".into(), NoParams::default())
            .await
            .map_err(wallet_error)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, WalletError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(wallet_error)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, WalletError> {
        self.provider
            .estimate_gas(tx.clone())
            .await
            .map_err(wallet_error)
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, WalletError> {
        self.provider.call(tx.clone()).await.map_err(wallet_error)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, WalletError> {
        IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))
    }

    async fn eth_sign(&self, address: Address, hash: B256) -> Result<Bytes, WalletError> {
        self.provider
            .raw_request("eth_sign".into(), (address, hash))
            .await
            .map_err(wallet_error)
    }

    async fn eth_sign_transaction(&self, tx: &TransactionRequest) -> Result<Bytes, WalletError> {
        self.provider
            .raw_request("eth_signTransaction".into(), (tx.clone(),))
            .await
            .map_err(wallet_error)
    }
}

/// Sorts a transport error into the cases callers act on.
pub fn wallet_error(err: TransportError) -> WalletError {
    match &err {
        RpcError::ErrorResp(payload) => match payload.code {
            USER_REJECTED_CODE => WalletError::UserRejected,
            METHOD_NOT_FOUND_CODE => WalletError::MethodUnsupported(payload.message.to_string()),
            code if code == EXECUTION_REVERTED_CODE || payload.message.contains("revert") => {
                let reason = payload
                    .as_revert_data()
                    .and_then(|data| Revert::abi_decode(&data).ok())
                    .map(|revert| revert.reason().to_string())
                    .or_else(|| reason_from_message(&payload.message));
                WalletError::Reverted { reason }
            }
            _ => WalletError::Backend(err.to_string()),
        },
        _ => WalletError::Backend(err.to_string()),
    }
}

/// Nodes without revert data put the reason in the message, e.g.
/// `execution reverted: UniswapV2Router: EXPIRED`.
fn reason_from_message(message: &str) -> Option<String> {
    message
        .split_once("reverted:")
        .map(|(_, reason)| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
}
