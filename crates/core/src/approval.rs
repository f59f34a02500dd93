use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Whether the router may spend the input token on the wallet's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    /// Allowance not fetched yet.
    #[default]
    Unknown,
    NotApproved,
    /// An approval was signed and handed off but is not mined yet. Public nodes cannot see it,
    /// so its `nonce` is the only record of it.
    Pending { nonce: u64 },
    Approved,
}

impl ApprovalState {
    /// Derives the state from the on-chain allowance. `pending` is the nonce of an approval
    /// already handed off; it wins over a short allowance so it is never signed twice.
    pub fn from_allowance(
        allowance: Option<&BigUint>,
        required: &BigUint,
        pending: Option<u64>,
    ) -> Self {
        match (allowance, pending) {
            (Some(allowance), _) if allowance >= required => ApprovalState::Approved,
            (_, Some(nonce)) => ApprovalState::Pending { nonce },
            (Some(_), None) => ApprovalState::NotApproved,
            (None, None) => ApprovalState::Unknown,
        }
    }

    /// A new approval transaction has to be signed before the swap.
    pub fn needs_approval(&self) -> bool {
        matches!(self, ApprovalState::Unknown | ApprovalState::NotApproved)
    }

    /// Nonce of the approval waiting to be mined.
    pub fn pending_nonce(&self) -> Option<u64> {
        match self {
            ApprovalState::Pending { nonce } => Some(*nonce),
            _ => None,
        }
    }
}
