use thiserror::Error;

use crate::{swap::wallet::WalletError, validation::ValidationError};

/// Which balance fell short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceKind {
    Token,
    Native,
}

/// Failures of a swap attempt, surfaced to the caller as a single message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwapError {
    #[error("insufficient liquidity for this trade")]
    NoLiquidity,
    #[error("trade amount too small to cover fees")]
    BelowMinimumTrade,
    #[error("invalid recipient")]
    InvalidRecipient,
    #[error("insufficient {0:?} balance")]
    InsufficientBalance(BalanceKind),
    #[error("{0}")]
    GasEstimationFailed(String),
    #[error("transaction rejected in wallet")]
    SigningRejected,
    #[error("wallet does not support {0}")]
    SigningUnsupportedWallet(String),
    #[error("approval failed: {0}")]
    ApprovalFailed(String),
    #[error("swap failed: {0}")]
    SwapFailed(String),
    /// The attempt cannot start yet, e.g. fee data or wallet missing.
    #[error("not ready: {0}")]
    NotReady(ValidationError),
}

impl SwapError {
    /// Wallet-side failures during signing. Rejection and unsupported methods keep their own
    /// variants; everything else is attributed to the transaction being signed.
    pub fn from_signing(err: WalletError, approval: bool) -> Self {
        match err {
            WalletError::UserRejected => SwapError::SigningRejected,
            WalletError::MethodUnsupported(method) => SwapError::SigningUnsupportedWallet(method),
            other if approval => SwapError::ApprovalFailed(other.to_string()),
            other => SwapError::SwapFailed(other.to_string()),
        }
    }
}

impl From<ValidationError> for SwapError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NoRoute => SwapError::NoLiquidity,
            ValidationError::BelowMinimumTrade => SwapError::BelowMinimumTrade,
            ValidationError::InvalidRecipient => SwapError::InvalidRecipient,
            ValidationError::InsufficientTokenBalance => {
                SwapError::InsufficientBalance(BalanceKind::Token)
            }
            ValidationError::InsufficientNativeBalance => {
                SwapError::InsufficientBalance(BalanceKind::Native)
            }
            other => SwapError::NotReady(other),
        }
    }
}
