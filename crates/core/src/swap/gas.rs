use alloy::primitives::Address;
use tracing::{debug, instrument, warn};

use super::{
    call::PendingCall,
    wallet::{WalletError, WalletRpc},
};
use crate::error::SwapError;

pub const DEFAULT_GAS_MARGIN_BPS: u64 = 1_000;

/// Inflates `gas` by `margin_bps` basis points.
pub fn with_margin(gas: u64, margin_bps: u64) -> u64 {
    let inflated = u128::from(gas) * u128::from(10_000 + margin_bps) / 10_000;
    u64::try_from(inflated).unwrap_or(u64::MAX)
}

/// Message shown when estimation fails and the simulation reverts with `reason`.
pub fn revert_message(reason: &str) -> String {
    // router errors arrive as "<Router>: CODE"
    let code = reason.rsplit(": ").next().unwrap_or(reason).trim();
    match code {
        "INSUFFICIENT_OUTPUT_AMOUNT" | "EXCESSIVE_INPUT_AMOUNT" => {
            "This transaction will not succeed either due to price movement or fee on transfer. \
             Try increasing your slippage tolerance."
                .to_string()
        }
        "EXPIRED" => "This transaction could not be sent because the deadline has passed. \
                      Please check that your transaction deadline is not too low."
            .to_string(),
        "TRANSFER_FROM_FAILED" => "The input token cannot be transferred. \
                                   There may be an issue with the input token."
            .to_string(),
        "TRANSFER_FAILED" => "The output token cannot be transferred. \
                              There may be an issue with the output token."
            .to_string(),
        _ => format!(
            "The transaction cannot succeed due to error: {reason}. \
             This is probably an issue with one of the tokens you are swapping."
        ),
    }
}

const UNEXPECTED_ESTIMATION_FAILURE: &str =
    "Unexpected issue with estimating the gas. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatedCall {
    pub call: PendingCall,
    /// Estimate with the safety margin applied.
    pub gas_limit: u64,
}

/// Estimates every candidate and returns the first that succeeds.
///
/// A failed estimate is followed by one static call to learn why; the estimate itself is not
/// retried. If every candidate fails the first candidate's error is returned.
#[instrument(skip_all, fields(candidates = calls.len()))]
pub async fn estimate_calls<W: WalletRpc>(
    wallet: &W,
    from: Address,
    calls: &[PendingCall],
    margin_bps: u64,
) -> Result<EstimatedCall, SwapError> {
    let mut first_error = None;

    for call in calls {
        let request = call.to_request(from);
        match wallet.estimate_gas(&request).await {
            Ok(gas) => {
                let gas_limit = with_margin(gas, margin_bps);
                debug!(method = call.method, gas, gas_limit, "Estimated gas");
                return Ok(EstimatedCall {
                    call: call.clone(),
                    gas_limit,
                });
            }
            Err(estimate_err) => {
                debug!(
                    method = call.method,
                    error = %estimate_err,
                    "Gas estimate failed, simulating"
                );
                let message = match wallet.call(&request).await {
                    Ok(_) => {
                        warn!(method = call.method, "Simulation succeeded after failed estimate");
                        UNEXPECTED_ESTIMATION_FAILURE.to_string()
                    }
                    Err(WalletError::Reverted {
                        reason: Some(reason),
                    }) => revert_message(&reason),
                    Err(other) => revert_message(&other.to_string()),
                };
                first_error.get_or_insert(SwapError::GasEstimationFailed(message));
            }
        }
    }

    Err(first_error.unwrap_or(SwapError::GasEstimationFailed(
        UNEXPECTED_ESTIMATION_FAILURE.to_string(),
    )))
}
