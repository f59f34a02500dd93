use std::cmp::Ordering;

use tracing::debug;

use crate::{
    amount::{AmountError, CurrencyAmount},
    currency::Currency,
    pricing::{FeeInputs, Pricer},
    route::Pair,
    trade::TradeType,
};

/// Per trade type, the smallest amount whose value is not eaten by fees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinTradeEstimate {
    /// Floor on the input amount of exact-input trades.
    pub exact_input: CurrencyAmount,
    /// Floor on the output amount of exact-output trades.
    pub exact_output: CurrencyAmount,
}

impl MinTradeEstimate {
    pub fn floor(&self, trade_type: TradeType) -> &CurrencyAmount {
        match trade_type {
            TradeType::ExactInput => &self.exact_input,
            TradeType::ExactOutput => &self.exact_output,
        }
    }

    /// Whether `amount` is strictly below the floor for `trade_type`.
    pub fn is_below(
        &self,
        amount: &CurrencyAmount,
        trade_type: TradeType,
    ) -> Result<bool, AmountError> {
        Ok(amount.try_cmp(self.floor(trade_type))? == Ordering::Less)
    }
}

/// Asks the pricer for the minimum viable amounts over `pairs`.
///
/// `None` when there are no pairs or the fee inputs are unknown.
pub fn min_trade_amount<P: Pricer>(
    pricer: &P,
    pairs: &[Pair],
    currency_in: &Currency,
    currency_out: &Currency,
    fees: Option<&FeeInputs>,
    min_margin: u64,
) -> Option<MinTradeEstimate> {
    let fees = fees?;
    if pairs.is_empty() {
        debug!(%currency_in, %currency_out, "No pairs for minimum trade estimate");
        return None;
    }
    pricer.estimate_min_trade_amounts(pairs, currency_in, currency_out, fees, min_margin)
}
