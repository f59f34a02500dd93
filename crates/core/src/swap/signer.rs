//! Signing styles supported by connected wallets.
//!
//! Some wallets only sign raw hashes through `eth_sign`, others only sign full transactions
//! through `eth_signTransaction`. The style is chosen once per connection by [`probe`].
use std::future::Future;

use alloy::{
    consensus::{SignableTransaction as _, TxEip1559, TxEnvelope},
    eips::eip2718::Encodable2718 as _,
    primitives::{Address, B256, Bytes, Signature, keccak256},
    rpc::types::{TransactionInput, TransactionRequest},
};
use tracing::{debug, instrument};

use super::wallet::{WalletError, WalletRpc};

/// A signed transaction that has not been broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    /// EIP-2718 encoding.
    pub raw: Bytes,
    pub hash: B256,
}

pub trait Signer: Send + Sync {
    fn sign<W: WalletRpc>(
        &self,
        wallet: &W,
        from: Address,
        tx: TxEip1559,
    ) -> impl Future<Output = Result<SignedTx, WalletError>> + Send;
}

/// Signs the transaction's signing hash with `eth_sign` and assembles the envelope locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthSignSigner;

impl Signer for EthSignSigner {
    async fn sign<W: WalletRpc>(
        &self,
        wallet: &W,
        from: Address,
        tx: TxEip1559,
    ) -> Result<SignedTx, WalletError> {
        let signature_hash = tx.signature_hash();
        let raw_signature = wallet.eth_sign(from, signature_hash).await?;
        let signature = Signature::from_raw(&raw_signature)
            .map_err(|e| WalletError::Backend(format!("malformed signature: {e}")))?;

        let signed = recover_checked(tx, signature, signature_hash, from)?;
        let envelope: TxEnvelope = signed.into();
        Ok(SignedTx {
            raw: envelope.encoded_2718().into(),
            hash: *envelope.tx_hash(),
        })
    }
}

fn recover_checked(
    tx: TxEip1559,
    signature: Signature,
    signature_hash: B256,
    from: Address,
) -> Result<alloy::consensus::Signed<TxEip1559>, WalletError> {
    let signer = signature
        .recover_address_from_prehash(&signature_hash)
        .map_err(|e| WalletError::Backend(format!("unrecoverable signature: {e}")))?;
    if signer != from {
        return Err(WalletError::Backend(format!(
            "wallet signed as {signer}, expected {from}"
        )));
    }
    Ok(tx.into_signed(signature))
}

/// Hands the populated transaction to the wallet through `eth_signTransaction`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthSignTransactionSigner;

impl Signer for EthSignTransactionSigner {
    async fn sign<W: WalletRpc>(
        &self,
        wallet: &W,
        from: Address,
        tx: TxEip1559,
    ) -> Result<SignedTx, WalletError> {
        let request = TransactionRequest {
            from: Some(from),
            to: Some(tx.to),
            nonce: Some(tx.nonce),
            gas: Some(tx.gas_limit),
            max_fee_per_gas: Some(tx.max_fee_per_gas),
            max_priority_fee_per_gas: Some(tx.max_priority_fee_per_gas),
            value: Some(tx.value),
            input: TransactionInput::new(tx.input),
            chain_id: Some(tx.chain_id),
            access_list: Some(tx.access_list),
            transaction_type: Some(2),
            ..Default::default()
        };
        let raw = wallet.eth_sign_transaction(&request).await?;
        Ok(SignedTx {
            hash: keccak256(&raw),
            raw,
        })
    }
}

/// The signing style picked for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    EthSign,
    EthSignTransaction,
}

impl Signer for SignerKind {
    async fn sign<W: WalletRpc>(
        &self,
        wallet: &W,
        from: Address,
        tx: TxEip1559,
    ) -> Result<SignedTx, WalletError> {
        match self {
            SignerKind::EthSign => EthSignSigner.sign(wallet, from, tx).await,
            SignerKind::EthSignTransaction => EthSignTransactionSigner.sign(wallet, from, tx).await,
        }
    }
}

/// Client-version fragment of wallets that refuse `eth_signTransaction`.
const ETH_SIGN_WALLETS: &[&str] = &["MetaMask"];

/// Picks the signing style for the connected wallet.
#[instrument(skip_all)]
pub async fn probe<W: WalletRpc>(wallet: &W) -> Result<SignerKind, WalletError> {
    let version = match wallet.client_version().await {
        Ok(version) => version,
        Err(WalletError::MethodUnsupported(_)) => {
            debug!("Wallet does not report a client version");
            return Ok(SignerKind::EthSignTransaction);
        }
        Err(e) => return Err(e),
    };

    let kind = if ETH_SIGN_WALLETS
        .iter()
        .any(|fragment| version.contains(fragment))
    {
        SignerKind::EthSign
    } else {
        SignerKind::EthSignTransaction
    };
    debug!(client.version = %version, ?kind, "Selected signing style");
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::testing::FakeWallet;

    #[tokio::test]
    async fn probe_selects_eth_sign_for_metamask() {
        let wallet = FakeWallet::new().with_client_version("MetaMask/v11.16.0");
        assert_eq!(probe(&wallet).await, Ok(SignerKind::EthSign));

        let geth = "Geth/v1.14.0-stable/linux-amd64/go1.22";
        let wallet = FakeWallet::new().with_client_version(geth);
        assert_eq!(probe(&wallet).await, Ok(SignerKind::EthSignTransaction));
    }

    #[tokio::test]
    async fn eth_sign_produces_envelope_signed_by_wallet() {
        let wallet = FakeWallet::new();
        let tx = TxEip1559 {
            chain_id: 1,
            nonce: 3,
            gas_limit: 21_000,
            max_fee_per_gas: 10,
            ..Default::default()
        };

        let signed = EthSignSigner
            .sign(&wallet, wallet.address(), tx.clone())
            .await
            .unwrap();
        assert_eq!(signed.hash, keccak256(&signed.raw));
        // EIP-1559 envelopes are type 2
        assert_eq!(signed.raw[0], 0x02);

        let other = Address::repeat_byte(0x42);
        assert!(matches!(
            EthSignSigner.sign(&wallet, other, tx).await,
            Err(WalletError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn rejection_passes_through() {
        let wallet = FakeWallet::new().rejecting_signatures();
        let result = SignerKind::EthSignTransaction
            .sign(&wallet, wallet.address(), TxEip1559::default())
            .await;
        assert_eq!(result, Err(WalletError::UserRejected));
    }
}
