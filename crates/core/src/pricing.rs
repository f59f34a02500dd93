//! Seams to the routing SDK and the pool data it prices over.
//!
//! Pool maths (reserves, price impact, route construction) lives behind [`Pricer`]; this crate
//! owns only the policy of which calls to make and how to compare what comes back.
use num_bigint::BigUint;

use crate::{
    amount::CurrencyAmount,
    bribe::BribeEstimate,
    currency::{Currency, Token},
    min_trade::MinTradeEstimate,
    route::{Pair, VenueId},
    trade::Trade,
};

/// Fee parameters every fee-inclusive quote needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeeInputs {
    /// Gas price (wei) the transaction must be willing to pay.
    pub gas_price_to_beat: BigUint,
    /// Bribe margin in percent.
    pub bribe_margin: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestTradeOptions {
    pub max_hops: usize,
    pub max_num_results: usize,
}

impl BestTradeOptions {
    pub fn single(max_hops: usize) -> Self {
        Self {
            max_hops,
            max_num_results: 1,
        }
    }
}

/// The routing SDK.
///
/// Implementations return trades sorted best first and must only build routes through the
/// supplied pairs.
pub trait Pricer {
    fn best_trade_exact_in(
        &self,
        pairs: &[Pair],
        amount_in: &CurrencyAmount,
        currency_out: &Currency,
        fees: &FeeInputs,
        options: BestTradeOptions,
    ) -> Vec<Trade>;

    fn best_trade_exact_out(
        &self,
        pairs: &[Pair],
        currency_in: &Currency,
        amount_out: &CurrencyAmount,
        fees: &FeeInputs,
        options: BestTradeOptions,
    ) -> Vec<Trade>;

    /// The smallest amounts worth trading once fees are paid, or `None` if `pairs` cannot
    /// connect the currencies.
    fn estimate_min_trade_amounts(
        &self,
        pairs: &[Pair],
        currency_in: &Currency,
        currency_out: &Currency,
        fees: &FeeInputs,
        min_margin: u64,
    ) -> Option<MinTradeEstimate>;

    fn estimate_bribe_amounts(
        &self,
        native: &Currency,
        priority_fee: &BigUint,
        margin_percent: u64,
    ) -> BribeEstimate;
}

/// Current pool snapshots, refreshed every block by an external indexer.
pub trait PairSource {
    /// Existing pairs on `venue` for the requested token combinations. Missing pools are
    /// omitted.
    fn pairs(&self, venue: &VenueId, combinations: &[(Token, Token)]) -> Vec<Pair>;
}
