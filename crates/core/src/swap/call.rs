//! Router call construction for a quoted trade.
use alloy::{
    primitives::{Address, Bytes, TxKind, U256},
    rpc::types::{TransactionInput, TransactionRequest},
    sol,
    sol_types::SolCall as _,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    amount::Percent,
    currency::Token,
    error::SwapError,
    trade::{Trade, TradeType},
};

sol! {
    struct Swap {
        uint256 amount0;
        uint256 amount1;
        address[] path;
        address to;
        uint256 deadline;
    }

    /// Uniswap V2 style router that forwards `bribe` wei of the attached value to the block
    /// builder.
    interface IBribeRouter {
        function swapExactETHForTokens(Swap calldata swap, uint256 bribe) external payable returns (uint256[] memory amounts);
        function swapETHForExactTokens(Swap calldata swap, uint256 bribe) external payable returns (uint256[] memory amounts);
        function swapExactTokensForETH(Swap calldata swap, uint256 bribe) external payable returns (uint256[] memory amounts);
        function swapTokensForExactETH(Swap calldata swap, uint256 bribe) external payable returns (uint256[] memory amounts);
        function swapExactTokensForTokens(Swap calldata swap, uint256 bribe) external payable returns (uint256[] memory amounts);
        function swapTokensForExactTokens(Swap calldata swap, uint256 bribe) external payable returns (uint256[] memory amounts);
        function swapExactETHForTokensSupportingFeeOnTransferTokens(Swap calldata swap, uint256 bribe) external payable;
        function swapExactTokensForETHSupportingFeeOnTransferTokens(Swap calldata swap, uint256 bribe) external payable;
        function swapExactTokensForTokensSupportingFeeOnTransferTokens(Swap calldata swap, uint256 bribe) external payable;
    }

    // Taken from https://github.com/OpenZeppelin/openzeppelin-contracts/blob/3790c59623e99cb0272ddf84e6a17a5979d06b35/contracts/token/ERC20/IERC20.sol
    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
}

/// A contract call ready for estimation and signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub contract: Address,
    pub method: &'static str,
    pub calldata: Bytes,
    pub value: U256,
}

impl PendingCall {
    /// Transaction request from `from`. Zero value is left unset.
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(self.contract)),
            value: (!self.value.is_zero()).then_some(self.value),
            input: TransactionInput {
                input: Some(self.calldata.clone()),
                data: None,
            },
            ..Default::default()
        }
    }
}

/// The `swap` summary shared with the relay alongside the signed transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSummary {
    pub amount0: U256,
    pub amount1: U256,
    pub path: Vec<Address>,
    pub to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParameters {
    pub recipient: Address,
    pub slippage: Percent,
    /// Unix timestamp after which the router rejects the swap.
    pub deadline: u64,
    /// Also offer the fee-on-transfer variants for exact-input trades.
    pub allow_fee_on_transfer: bool,
}

/// Everything needed to sign and relay one trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCalls {
    /// Candidates in order of preference.
    pub candidates: Vec<PendingCall>,
    pub summary: SwapSummary,
    pub bribe: U256,
    /// Raw input amount the router may pull, the approval target.
    pub max_input: U256,
}

pub fn to_u256(value: &BigUint) -> Result<U256, SwapError> {
    U256::try_from_be_slice(&value.to_bytes_be())
        .ok_or_else(|| SwapError::SwapFailed(format!("amount {value} overflows uint256")))
}

/// Builds the router calls for `trade`.
///
/// `amount0` is the exact side (input for exact-input trades, output for exact-output) and
/// `amount1` the slippage-bounded side.
pub fn swap_calls(
    trade: &Trade,
    router: Address,
    params: &SwapParameters,
) -> Result<SwapCalls, SwapError> {
    let max_in = to_u256(&trade.maximum_amount_in(&params.slippage).raw_unsigned())?;
    let min_out = to_u256(&trade.minimum_amount_out(&params.slippage).raw_unsigned())?;
    let bribe = to_u256(&trade.miner_bribe().raw_unsigned())?;

    let (amount0, amount1) = match trade.trade_type() {
        TradeType::ExactInput => (max_in, min_out),
        TradeType::ExactOutput => (min_out, max_in),
    };
    let path: Vec<Address> = trade.route().path().iter().map(|t: &Token| t.address).collect();

    let swap = Swap {
        amount0,
        amount1,
        path: path.clone(),
        to: params.recipient,
        deadline: U256::from(params.deadline),
    };

    let native_in = trade.input_amount().currency().is_native();
    let native_out = trade.output_amount().currency().is_native();
    let value = if native_in { bribe + max_in } else { bribe };

    let mut calls: Vec<(&'static str, Vec<u8>)> = Vec::with_capacity(2);
    match (trade.trade_type(), native_in, native_out) {
        (_, true, true) => {
            return Err(SwapError::SwapFailed(
                "cannot swap native currency for itself".to_string(),
            ));
        }
        (TradeType::ExactInput, true, false) => {
            calls.push((
                "swapExactETHForTokens",
                IBribeRouter::swapExactETHForTokensCall { swap: swap.clone(), bribe }.abi_encode(),
            ));
            if params.allow_fee_on_transfer {
                calls.push((
                    "swapExactETHForTokensSupportingFeeOnTransferTokens",
                    IBribeRouter::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
                        swap: swap.clone(),
                        bribe,
                    }
                    .abi_encode(),
                ));
            }
        }
        (TradeType::ExactInput, false, true) => {
            calls.push((
                "swapExactTokensForETH",
                IBribeRouter::swapExactTokensForETHCall { swap: swap.clone(), bribe }.abi_encode(),
            ));
            if params.allow_fee_on_transfer {
                calls.push((
                    "swapExactTokensForETHSupportingFeeOnTransferTokens",
                    IBribeRouter::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                        swap: swap.clone(),
                        bribe,
                    }
                    .abi_encode(),
                ));
            }
        }
        (TradeType::ExactInput, false, false) => {
            calls.push((
                "swapExactTokensForTokens",
                IBribeRouter::swapExactTokensForTokensCall {
                    swap: swap.clone(),
                    bribe,
                }
                .abi_encode(),
            ));
            if params.allow_fee_on_transfer {
                calls.push((
                    "swapExactTokensForTokensSupportingFeeOnTransferTokens",
                    IBribeRouter::swapExactTokensForTokensSupportingFeeOnTransferTokensCall {
                        swap: swap.clone(),
                        bribe,
                    }
                    .abi_encode(),
                ));
            }
        }
        (TradeType::ExactOutput, true, false) => calls.push((
            "swapETHForExactTokens",
            IBribeRouter::swapETHForExactTokensCall { swap: swap.clone(), bribe }.abi_encode(),
        )),
        (TradeType::ExactOutput, false, true) => calls.push((
            "swapTokensForExactETH",
            IBribeRouter::swapTokensForExactETHCall { swap: swap.clone(), bribe }.abi_encode(),
        )),
        (TradeType::ExactOutput, false, false) => calls.push((
            "swapTokensForExactTokens",
            IBribeRouter::swapTokensForExactTokensCall { swap: swap.clone(), bribe }.abi_encode(),
        )),
    }

    let candidates = calls
        .into_iter()
        .map(|(method, calldata)| PendingCall {
            contract: router,
            method,
            calldata: calldata.into(),
            value,
        })
        .collect();

    Ok(SwapCalls {
        candidates,
        summary: SwapSummary {
            amount0,
            amount1,
            path,
            to: params.recipient,
        },
        bribe,
        max_input: max_in,
    })
}

/// Unlimited approval of `spender` on `token`.
pub fn approve_call(token: Address, spender: Address) -> PendingCall {
    PendingCall {
        contract: token,
        method: "approve",
        calldata: IERC20::approveCall {
            spender,
            value: U256::MAX,
        }
        .abi_encode()
        .into(),
        value: U256::ZERO,
    }
}
