//! Scriptable wallet and relay for submission tests.
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloy::{
    primitives::{Address, B256, Bytes, U256},
    rpc::types::TransactionRequest,
    signers::{SignerSync as _, local::PrivateKeySigner},
};
use color_eyre::eyre;
use tokio::sync::broadcast;

use super::wallet::{WalletError, WalletRpc};
use crate::relay::{RelayRequest, RelayTransport, TransactionStatus};

pub(crate) struct FakeWallet {
    key: PrivateKeySigner,
    client_version: Result<String, WalletError>,
    default_estimate: Result<u64, WalletError>,
    /// Estimates keyed by the first calldata byte.
    estimates: HashMap<u8, u64>,
    call_result: Result<Bytes, WalletError>,
    allowance: U256,
    nonce: u64,
    reject_signatures: bool,
    simulations: AtomicUsize,
    signed: Mutex<Vec<TransactionRequest>>,
}

impl FakeWallet {
    pub fn new() -> Self {
        Self {
            key: PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).expect("valid key"),
            client_version: Ok("Geth/v1.14.0".to_string()),
            default_estimate: Ok(100_000),
            estimates: HashMap::new(),
            call_result: Ok(Bytes::new()),
            allowance: U256::MAX,
            nonce: 7,
            reject_signatures: false,
            simulations: AtomicUsize::new(0),
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn with_client_version(mut self, version: &str) -> Self {
        self.client_version = Ok(version.to_string());
        self
    }

    pub fn failing_estimates(mut self) -> Self {
        self.default_estimate = Err(WalletError::Backend("gas required exceeds allowance".into()));
        self
    }

    pub fn with_estimate(mut self, selector: u8, gas: u64) -> Self {
        self.estimates.insert(selector, gas);
        self
    }

    pub fn reverting_calls(mut self, reason: &str) -> Self {
        self.call_result = Err(WalletError::Reverted {
            reason: Some(reason.to_string()),
        });
        self
    }

    pub fn with_allowance(mut self, allowance: U256) -> Self {
        self.allowance = allowance;
        self
    }

    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signatures = true;
        self
    }

    pub fn simulations(&self) -> usize {
        self.simulations.load(Ordering::SeqCst)
    }

    /// Requests passed to `eth_signTransaction`, in order.
    pub fn signed(&self) -> Vec<TransactionRequest> {
        self.signed.lock().expect("not poisoned").clone()
    }
}

impl WalletRpc for FakeWallet {
    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(1)
    }

    async fn client_version(&self) -> Result<String, WalletError> {
        self.client_version.clone()
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64, WalletError> {
        Ok(self.nonce)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, WalletError> {
        let selector = tx.input.input().and_then(|input| input.first().copied());
        match selector.and_then(|s| self.estimates.get(&s)) {
            Some(gas) => Ok(*gas),
            None => self.default_estimate.clone(),
        }
    }

    async fn call(&self, _tx: &TransactionRequest) -> Result<Bytes, WalletError> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        self.call_result.clone()
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, WalletError> {
        Ok(self.allowance)
    }

    async fn eth_sign(&self, _address: Address, hash: B256) -> Result<Bytes, WalletError> {
        if self.reject_signatures {
            return Err(WalletError::UserRejected);
        }
        let signature = self
            .key
            .sign_hash_sync(&hash)
            .map_err(|e| WalletError::Backend(e.to_string()))?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }

    async fn eth_sign_transaction(&self, tx: &TransactionRequest) -> Result<Bytes, WalletError> {
        if self.reject_signatures {
            return Err(WalletError::UserRejected);
        }
        self.signed.lock().expect("not poisoned").push(tx.clone());
        let nonce = tx.nonce.unwrap_or_default();
        Ok(Bytes::from(vec![0x02, nonce as u8]))
    }
}

pub(crate) struct FakeRelay {
    pub requests: Mutex<Vec<(B256, RelayRequest)>>,
    pub cancellations: Mutex<Vec<B256>>,
    pub status_tx: broadcast::Sender<TransactionStatus>,
    pub fail: bool,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            cancellations: Mutex::new(Vec::new()),
            status_tx: broadcast::channel(8).0,
            fail: false,
        }
    }
}

impl RelayTransport for FakeRelay {
    async fn emit_transaction_request(
        &self,
        hash: B256,
        request: RelayRequest,
    ) -> eyre::Result<()> {
        if self.fail {
            eyre::bail!("relay connection closed");
        }
        self.requests.lock().expect("not poisoned").push((hash, request));
        Ok(())
    }

    async fn emit_transaction_cancellation(&self, hash: B256) -> eyre::Result<()> {
        self.cancellations.lock().expect("not poisoned").push(hash);
        Ok(())
    }

    fn subscribe_status(&self) -> broadcast::Receiver<TransactionStatus> {
        self.status_tx.subscribe()
    }
}
