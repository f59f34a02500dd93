//! Base-fee envelope and priority-fee sampling from observed blocks.
use std::collections::VecDeque;

use num_bigint::BigUint;
use num_traits::Zero as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// EIP-1559 caps the per-block base fee change at 12.5%.
const MAX_CHANGE_NUMERATOR_UP: u32 = 1125;
const MAX_CHANGE_NUMERATOR_DOWN: u32 = 875;
const MAX_CHANGE_DENOMINATOR: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseFeeEnvelope {
    pub current: BigUint,
    /// Lowest base fee reachable after `blocks_ahead` blocks, plus one wei.
    pub min: BigUint,
    /// Highest base fee reachable after `blocks_ahead` blocks, plus one wei.
    pub max: BigUint,
    pub blocks_ahead: u32,
}

/// Computes the reachable base fee range after `blocks_ahead` blocks of maximal adjustment.
pub fn base_fee_envelope(base_fee: &BigUint, blocks_ahead: u32) -> BaseFeeEnvelope {
    let denominator = BigUint::from(MAX_CHANGE_DENOMINATOR).pow(blocks_ahead);
    let max = base_fee * BigUint::from(MAX_CHANGE_NUMERATOR_UP).pow(blocks_ahead) / &denominator
        + 1u32;
    let min = base_fee * BigUint::from(MAX_CHANGE_NUMERATOR_DOWN).pow(blocks_ahead) / &denominator
        + 1u32;

    BaseFeeEnvelope {
        current: base_fee.clone(),
        min,
        max,
        blocks_ahead,
    }
}

/// Fee fields of a transaction relevant to its effective tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFeeFields {
    /// Pre-EIP-1559 transaction (legacy or access list).
    Legacy { gas_price: u128 },
    Eip1559 { max_priority_fee_per_gas: u128 },
}

impl TxFeeFields {
    /// Effective priority fee. Legacy transactions tip whatever exceeds the base fee.
    pub fn priority_fee(&self, base_fee: Option<u128>) -> Option<u128> {
        match self {
            TxFeeFields::Legacy { gas_price } => {
                base_fee.map(|base_fee| gas_price.saturating_sub(base_fee))
            }
            TxFeeFields::Eip1559 {
                max_priority_fee_per_gas,
            } => Some(*max_priority_fee_per_gas),
        }
    }
}

/// The slice of a block the oracle consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFeeSample {
    pub number: u64,
    pub base_fee: Option<u128>,
    /// Fee fields of the last transaction in the block, if the block has any.
    pub last_tx: Option<TxFeeFields>,
}

#[derive(Debug, Clone)]
pub struct FeeOracle {
    blocks_ahead: u32,
    window_size: usize,
    window: VecDeque<BigUint>,
    latest_block: Option<u64>,
    base_fee: Option<BigUint>,
}

impl FeeOracle {
    pub fn new(blocks_ahead: u32, window_size: usize) -> Self {
        Self {
            blocks_ahead,
            window_size: window_size.max(1),
            window: VecDeque::new(),
            latest_block: None,
            base_fee: None,
        }
    }

    /// Feeds one block into the oracle.
    ///
    /// Returns `false` if the block is not newer than the last one observed; such blocks are
    /// ignored so a late response for an old block cannot overwrite fresher data.
    pub fn observe(&mut self, sample: &BlockFeeSample) -> bool {
        if self
            .latest_block
            .is_some_and(|latest| sample.number <= latest)
        {
            trace!(block.number = sample.number, "Ignoring stale block");
            return false;
        }

        self.latest_block = Some(sample.number);
        self.base_fee = sample.base_fee.map(BigUint::from);

        match sample
            .last_tx
            .and_then(|tx| tx.priority_fee(sample.base_fee))
        {
            Some(priority_fee) => {
                if self.window.len() == self.window_size {
                    self.window.pop_front();
                }
                self.window.push_back(BigUint::from(priority_fee));
            }
            None => debug!(block.number = sample.number, "No priority fee sample in block"),
        }

        true
    }

    pub fn latest_block(&self) -> Option<u64> {
        self.latest_block
    }

    /// `None` until a block carrying a base fee has been observed.
    pub fn base_fee(&self) -> Option<BaseFeeEnvelope> {
        self.base_fee
            .as_ref()
            .map(|base_fee| base_fee_envelope(base_fee, self.blocks_ahead))
    }

    /// The price a transaction must be willing to pay per gas to land within the lookahead.
    pub fn gas_price_to_beat(&self) -> Option<BigUint> {
        self.base_fee().map(|envelope| envelope.max)
    }

    /// Average of the sampled priority fees.
    pub fn priority_fee(&self) -> Option<BigUint> {
        if self.window.is_empty() {
            return None;
        }
        let sum = self
            .window
            .iter()
            .fold(BigUint::zero(), |acc, sample| acc + sample);
        Some(sum / BigUint::from(self.window.len()))
    }
}
