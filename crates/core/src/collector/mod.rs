//! Block listener feeding the quoter.
//!
//! Every new header is turned into a [`ChainSnapshot`]: the fee sample for the block plus the
//! watched account's balances and router allowances at that block.
use std::{collections::HashMap, sync::Arc};

use alloy::{consensus::Transaction, primitives::Address};
use num_bigint::BigUint;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    fees::{BlockFeeSample, TxFeeFields},
    validation::WalletBalances,
};

mod worker;
pub use worker::Handle;

/// The account being watched and what to read for it each block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWatch {
    pub account: Address,
    pub tokens: Vec<Address>,
    /// Routers whose allowances are read for every watched token.
    pub spenders: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub block: BlockFeeSample,
    /// `None` without a watched account.
    pub balances: Option<WalletBalances>,
    /// Keyed by (token, spender).
    pub allowances: HashMap<(Address, Address), BigUint>,
}

impl ChainSnapshot {
    pub fn allowance(&self, token: Address, spender: Address) -> Option<&BigUint> {
        self.allowances.get(&(token, spender))
    }
}

/// Fee fields of a mined transaction.
pub fn tx_fee_fields<T: Transaction>(tx: &T) -> TxFeeFields {
    match tx.max_priority_fee_per_gas() {
        Some(max_priority_fee_per_gas) if tx.is_dynamic_fee() => TxFeeFields::Eip1559 {
            max_priority_fee_per_gas,
        },
        _ => TxFeeFields::Legacy {
            gas_price: tx.gas_price().unwrap_or_else(|| tx.max_fee_per_gas()),
        },
    }
}

pub struct Builder {
    pub ws_url: String,
    pub account: Option<AccountWatch>,
    pub shutdown_token: CancellationToken,
}

impl Builder {
    pub fn build(self) -> Handle {
        let Self {
            ws_url,
            account,
            shutdown_token,
        } = self;

        let (snapshot_tx, snapshot_rx) = watch::channel(None::<Arc<ChainSnapshot>>);

        let worker = worker::Worker {
            ws_url,
            account,
            snapshot_tx,
            shutdown_token: shutdown_token.clone(),
        };
        let worker_handle = tokio::spawn(worker.run());

        Handle::new(shutdown_token, worker_handle, snapshot_rx)
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        consensus::{TxEip1559, TxLegacy},
        primitives::TxKind,
    };

    use super::*;

    #[test]
    fn reads_fee_fields_per_transaction_type() {
        let legacy = TxLegacy {
            gas_price: 31_000_000_000,
            to: TxKind::Create,
            ..Default::default()
        };
        assert_eq!(
            tx_fee_fields(&legacy),
            TxFeeFields::Legacy {
                gas_price: 31_000_000_000
            }
        );

        let dynamic = TxEip1559 {
            max_fee_per_gas: 60_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            to: TxKind::Create,
            ..Default::default()
        };
        assert_eq!(
            tx_fee_fields(&dynamic),
            TxFeeFields::Eip1559 {
                max_priority_fee_per_gas: 2_000_000_000
            }
        );
    }

    #[test]
    fn allowances_are_keyed_by_token_and_spender() {
        let (token, router) = (Address::repeat_byte(0x01), Address::repeat_byte(0x77));
        let snapshot = ChainSnapshot {
            block: BlockFeeSample {
                number: 1,
                base_fee: Some(1),
                last_tx: None,
            },
            balances: None,
            allowances: HashMap::from([((token, router), BigUint::from(5u32))]),
        };
        assert_eq!(snapshot.allowance(token, router), Some(&BigUint::from(5u32)));
        assert_eq!(snapshot.allowance(router, token), None);
    }
}
