//! Best-trade search over venues and hop counts.
use std::collections::{HashMap, HashSet};

use alloy::primitives::Address;
use tracing::{debug, instrument, trace, warn};

use crate::{
    amount::{CurrencyAmount, Percent},
    currency::{Currency, Token},
    min_trade::{self, MinTradeEstimate},
    pricing::{BestTradeOptions, FeeInputs, PairSource, Pricer},
    route::{Pair, VenueId},
    trade::{Trade, TradeType, is_trade_better},
};

/// Upper bound on hops per route.
pub const MAX_HOPS: usize = 3;

/// One exchange venue and the tokens it routes through.
#[derive(Debug, Clone)]
pub struct Venue {
    pub id: VenueId,
    pub router: Address,
    pub factory: Address,
    /// Intermediate tokens tried for every pair.
    pub common_bases: Vec<Token>,
    /// Extra intermediates tried when a specific token is traded.
    pub additional_bases: HashMap<Address, Vec<Token>>,
    /// If present for a token, the only tokens it may be paired with.
    pub custom_bases: HashMap<Address, Vec<Token>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingSettings {
    /// How much better a trade must be to replace one found with fewer hops.
    pub better_trade_threshold: Percent,
    pub max_hops: usize,
    pub single_hop_only: bool,
    pub min_trade_margin: u64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            better_trade_threshold: Percent::from_bps(50),
            max_hops: MAX_HOPS,
            single_hop_only: false,
            min_trade_margin: 0,
        }
    }
}

/// What the user asked for. `amount` is in `input` for exact-input trades and in `output` for
/// exact-output trades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub input: Currency,
    pub output: Currency,
    pub amount: CurrencyAmount,
    pub trade_type: TradeType,
}

impl TradeRequest {
    pub fn exact_input(amount: CurrencyAmount, output: Currency) -> Self {
        Self {
            input: amount.currency().clone(),
            output,
            amount,
            trade_type: TradeType::ExactInput,
        }
    }

    pub fn exact_output(input: Currency, amount: CurrencyAmount) -> Self {
        Self {
            input,
            output: amount.currency().clone(),
            amount,
            trade_type: TradeType::ExactOutput,
        }
    }

    fn amount_matches_side(&self) -> bool {
        match self.trade_type {
            TradeType::ExactInput => self.amount.currency() == &self.input,
            TradeType::ExactOutput => self.amount.currency() == &self.output,
        }
    }
}

#[derive(Debug)]
pub struct RouteSearch<P, S> {
    pricer: P,
    pair_source: S,
    wrapped_native: Token,
    settings: RoutingSettings,
}

impl<P: Pricer, S: PairSource> RouteSearch<P, S> {
    pub fn new(
        pricer: P,
        pair_source: S,
        wrapped_native: Token,
        settings: RoutingSettings,
    ) -> Self {
        Self {
            pricer,
            pair_source,
            wrapped_native,
            settings,
        }
    }

    pub fn pricer(&self) -> &P {
        &self.pricer
    }

    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    pub fn wrapped_native(&self) -> &Token {
        &self.wrapped_native
    }

    pub fn set_single_hop_only(&mut self, single_hop_only: bool) {
        self.settings.single_hop_only = single_hop_only;
    }

    /// Unordered token pairs worth looking up on `venue` to connect `token_a` and `token_b`.
    pub fn candidate_combinations(
        &self,
        venue: &Venue,
        token_a: &Token,
        token_b: &Token,
    ) -> Vec<(Token, Token)> {
        let mut bases: Vec<Token> = Vec::new();
        let extra = [token_a, token_b]
            .into_iter()
            .filter_map(|token| venue.additional_bases.get(&token.address))
            .flatten();
        for base in venue.common_bases.iter().chain(extra) {
            if !bases.contains(base) {
                bases.push(base.clone());
            }
        }

        let base_pairs = bases
            .iter()
            .flat_map(|base| bases.iter().map(move |other| (base.clone(), other.clone())));

        let direct = std::iter::once((token_a.clone(), token_b.clone()));
        let with_a = bases.iter().map(|base| (token_a.clone(), base.clone()));
        let with_b = bases.iter().map(|base| (token_b.clone(), base.clone()));

        let mut seen = HashSet::new();
        direct
            .chain(with_a)
            .chain(with_b)
            .chain(base_pairs)
            .filter(|(t0, t1)| t0.address != t1.address)
            .filter(|(t0, t1)| custom_bases_allow(venue, t0, t1))
            .filter(|(t0, t1)| {
                let key = if t0.sorts_before(t1) {
                    (t0.address, t1.address)
                } else {
                    (t1.address, t0.address)
                };
                seen.insert(key)
            })
            .collect()
    }

    /// Existing pairs on `venue` usable for a trade between `input` and `output`.
    pub fn allowed_pairs(&self, venue: &Venue, input: &Currency, output: &Currency) -> Vec<Pair> {
        let token_a = input.wrapped(&self.wrapped_native);
        let token_b = output.wrapped(&self.wrapped_native);
        if token_a == token_b {
            return Vec::new();
        }

        let combinations = self.candidate_combinations(venue, token_a, token_b);
        let mut seen = HashSet::new();
        self.pair_source
            .pairs(&venue.id, &combinations)
            .into_iter()
            .filter(|pair| pair.venue == venue.id && seen.insert(pair.address))
            .collect()
    }

    pub fn min_trade_amount(
        &self,
        venue: &Venue,
        input: &Currency,
        output: &Currency,
        fees: Option<&FeeInputs>,
    ) -> Option<MinTradeEstimate> {
        let pairs = self.allowed_pairs(venue, input, output);
        min_trade::min_trade_amount(
            &self.pricer,
            &pairs,
            input,
            output,
            fees,
            self.settings.min_trade_margin,
        )
    }

    /// Best fee-inclusive trade on one venue, or `None` if nothing executable is found.
    #[instrument(
        skip_all,
        fields(venue = %venue.id, input = %request.input, output = %request.output)
    )]
    pub fn best_trade(
        &self,
        venue: &Venue,
        request: &TradeRequest,
        fees: Option<&FeeInputs>,
    ) -> Option<Trade> {
        let Some(fees) = fees else {
            trace!("Fee inputs unknown, cannot price trade");
            return None;
        };
        if !request.amount_matches_side() || request.amount.is_zero() {
            return None;
        }

        let pairs = self.allowed_pairs(venue, &request.input, &request.output);
        if pairs.is_empty() {
            debug!("No pairs connect the requested currencies");
            return None;
        }

        if let Some(estimate) = min_trade::min_trade_amount(
            &self.pricer,
            &pairs,
            &request.input,
            &request.output,
            Some(fees),
            self.settings.min_trade_margin,
        ) {
            match estimate.is_below(&request.amount, request.trade_type) {
                Ok(false) => {}
                Ok(true) => {
                    debug!(
                        amount = %request.amount,
                        floor = %estimate.floor(request.trade_type),
                        "Requested amount below minimum trade"
                    );
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "Minimum trade estimate in unexpected currency");
                    return None;
                }
            }
        }

        if self.settings.single_hop_only {
            return self.query(&pairs, request, fees, 1).into_iter().next();
        }

        let max_hops = self.settings.max_hops.clamp(1, MAX_HOPS);
        let mut best: Option<Trade> = None;
        for hops in 1..=max_hops {
            let current = self.query(&pairs, request, fees, hops).into_iter().next();
            match is_trade_better(
                best.as_ref(),
                current.as_ref(),
                &self.settings.better_trade_threshold,
            ) {
                Ok(Some(true)) => {
                    trace!(
                        hops,
                        trade = ?current.as_ref().map(ToString::to_string),
                        "New best trade"
                    );
                    best = current;
                }
                Ok(_) => {}
                Err(e) => warn!(hops, error = %e, "Pricer returned an incomparable trade"),
            }
        }

        best
    }

    /// Runs the search on every venue and keeps the winner under the same better-trade rule.
    pub fn best_trade_across(
        &self,
        venues: &[Venue],
        request: &TradeRequest,
        fees: Option<&FeeInputs>,
    ) -> Option<Trade> {
        let mut best: Option<Trade> = None;
        for venue in venues {
            let candidate = self.best_trade(venue, request, fees);
            match is_trade_better(
                best.as_ref(),
                candidate.as_ref(),
                &self.settings.better_trade_threshold,
            ) {
                Ok(Some(true)) => best = candidate,
                Ok(_) => {}
                Err(e) => warn!(venue = %venue.id, error = %e, "Venue trades not comparable"),
            }
        }

        if let Some(trade) = &best {
            debug!(%trade, "Selected best trade");
        }
        best
    }

    fn query(
        &self,
        pairs: &[Pair],
        request: &TradeRequest,
        fees: &FeeInputs,
        max_hops: usize,
    ) -> Vec<Trade> {
        let options = BestTradeOptions::single(max_hops);
        match request.trade_type {
            TradeType::ExactInput => {
                self.pricer
                    .best_trade_exact_in(pairs, &request.amount, &request.output, fees, options)
            }
            TradeType::ExactOutput => {
                self.pricer
                    .best_trade_exact_out(pairs, &request.input, &request.amount, fees, options)
            }
        }
    }
}

fn custom_bases_allow(venue: &Venue, t0: &Token, t1: &Token) -> bool {
    let allowed_for_0 = venue.custom_bases.get(&t0.address);
    let allowed_for_1 = venue.custom_bases.get(&t1.address);

    if allowed_for_0.is_some_and(|bases| !bases.contains(t1)) {
        return false;
    }
    if allowed_for_1.is_some_and(|bases| !bases.contains(t0)) {
        return false;
    }
    true
}
