//! In-memory pricer and pool source for unit tests.
use std::{collections::HashMap, sync::OnceLock};

use alloy::primitives::Address;
use num_bigint::{BigInt, BigUint};

use crate::{
    amount::{CurrencyAmount, Fraction},
    bribe::BribeEstimate,
    currency::{Currency, Token},
    min_trade::MinTradeEstimate,
    pricing::{BestTradeOptions, FeeInputs, PairSource, Pricer},
    route::{Pair, Route, VenueId},
    routing::Venue,
    trade::{
        Trade, TradeType,
        tests::{eth, weth},
    },
};

/// Prices every pool at its reserve ratio, without price impact.
#[derive(Debug, Clone)]
pub(crate) struct FakePricer {
    /// Floors on (exact input, exact output) amounts.
    pub min_trade: Option<(u64, u64)>,
    pub gas_per_hop: u64,
}

impl Default for FakePricer {
    fn default() -> Self {
        Self {
            min_trade: None,
            gas_per_hop: 100_000,
        }
    }
}

impl FakePricer {
    fn routes(
        &self,
        pairs: &[Pair],
        from: &Currency,
        to: &Currency,
        max_hops: usize,
    ) -> Vec<Route> {
        let (start, end) = (from.wrapped(&weth()).clone(), to.wrapped(&weth()).clone());
        let mut found = Vec::new();
        walk(pairs, &start, &end, max_hops, &mut vec![start.clone()], &mut Vec::new(), &mut found);
        found
            .into_iter()
            .filter_map(|hops| Route::new(hops, from.clone(), to.clone(), &weth()).ok())
            .collect()
    }

    fn trade(
        &self,
        route: Route,
        trade_type: TradeType,
        input: CurrencyAmount,
        output: CurrencyAmount,
    ) -> Option<Trade> {
        let gas = self.gas_per_hop * route.hops() as u64;
        let bribe = CurrencyAmount::from_raw(eth(), 1_000);
        Trade::new(route, trade_type, input, output, bribe, gas).ok()
    }
}

fn walk(
    pairs: &[Pair],
    current: &Token,
    end: &Token,
    max_hops: usize,
    visited: &mut Vec<Token>,
    stack: &mut Vec<Pair>,
    found: &mut Vec<Vec<Pair>>,
) {
    if stack.len() == max_hops {
        return;
    }
    for pair in pairs {
        let Some(next) = pair.other(current) else {
            continue;
        };
        if visited.contains(next) {
            continue;
        }
        stack.push(pair.clone());
        if next == end {
            found.push(stack.clone());
        } else {
            visited.push(next.clone());
            walk(pairs, next, end, max_hops, visited, stack, found);
            visited.pop();
        }
        stack.pop();
    }
}

fn rate(route: &Route) -> Fraction {
    route
        .pairs()
        .iter()
        .zip(route.path().windows(2))
        .fold(Fraction::from_integer(1), |acc, (pair, w)| {
            let reserve_in = pair.reserve_of(&w[0]).cloned().unwrap_or_default();
            let reserve_out = pair.reserve_of(&w[1]).cloned().unwrap_or_default();
            &acc * &Fraction::new(BigInt::from(reserve_out), BigInt::from(reserve_in))
        })
}

fn by_price_desc(a: &Trade, b: &Trade) -> std::cmp::Ordering {
    b.execution_price()
        .as_fraction()
        .cmp(a.execution_price().as_fraction())
}

fn ceil(fraction: &Fraction) -> BigInt {
    let quotient = fraction.quotient();
    if &Fraction::from_integer(quotient.clone()) < fraction {
        quotient + 1
    } else {
        quotient
    }
}

impl Pricer for FakePricer {
    fn best_trade_exact_in(
        &self,
        pairs: &[Pair],
        amount_in: &CurrencyAmount,
        currency_out: &Currency,
        _fees: &FeeInputs,
        options: BestTradeOptions,
    ) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .routes(pairs, amount_in.currency(), currency_out, options.max_hops)
            .into_iter()
            .filter_map(|route| {
                let out = (amount_in.as_fraction() * &rate(&route)).quotient();
                let output = CurrencyAmount::from_raw(currency_out.clone(), out);
                self.trade(route, TradeType::ExactInput, amount_in.clone(), output)
            })
            .collect();
        trades.sort_by(|a, b| by_price_desc(a, b));
        trades.truncate(options.max_num_results);
        trades
    }

    fn best_trade_exact_out(
        &self,
        pairs: &[Pair],
        currency_in: &Currency,
        amount_out: &CurrencyAmount,
        _fees: &FeeInputs,
        options: BestTradeOptions,
    ) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .routes(pairs, currency_in, amount_out.currency(), options.max_hops)
            .into_iter()
            .filter_map(|route| {
                let needed = ceil(&(amount_out.as_fraction() * &rate(&route).invert()));
                let input = CurrencyAmount::from_raw(currency_in.clone(), needed);
                self.trade(route, TradeType::ExactOutput, input, amount_out.clone())
            })
            .collect();
        trades.sort_by(|a, b| by_price_desc(a, b));
        trades.truncate(options.max_num_results);
        trades
    }

    fn estimate_min_trade_amounts(
        &self,
        _pairs: &[Pair],
        currency_in: &Currency,
        currency_out: &Currency,
        _fees: &FeeInputs,
        _min_margin: u64,
    ) -> Option<MinTradeEstimate> {
        self.min_trade.map(|(exact_input, exact_output)| MinTradeEstimate {
            exact_input: CurrencyAmount::from_raw(currency_in.clone(), exact_input),
            exact_output: CurrencyAmount::from_raw(currency_out.clone(), exact_output),
        })
    }

    fn estimate_bribe_amounts(
        &self,
        native: &Currency,
        priority_fee: &BigUint,
        margin_percent: u64,
    ) -> BribeEstimate {
        // 21k gas worth of tip at the base rate, scaled up by the margin for the upper bound
        let min = priority_fee * 21_000u32;
        let max = &min * (100 + margin_percent) / 100u32;
        BribeEstimate {
            min_bribe: CurrencyAmount::from_raw(native.clone(), BigInt::from(min)),
            max_bribe: CurrencyAmount::from_raw(native.clone(), BigInt::from(max)),
        }
    }
}

/// Serves a fixed set of pools, keyed by the unordered token addresses of each.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakePairSource {
    pairs: Vec<Pair>,
}

impl FakePairSource {
    pub fn new(pairs: Vec<Pair>) -> Self {
        Self { pairs }
    }
}

impl PairSource for FakePairSource {
    fn pairs(&self, venue: &VenueId, combinations: &[(Token, Token)]) -> Vec<Pair> {
        self.pairs
            .iter()
            .filter(|pair| &pair.venue == venue)
            .filter(|pair| {
                combinations
                    .iter()
                    .any(|(a, b)| pair.involves(a) && pair.involves(b))
            })
            .cloned()
            .collect()
    }
}

pub(crate) fn pair(
    venue: &str,
    a: &Token,
    b: &Token,
    reserve_a: u64,
    reserve_b: u64,
    address: u8,
) -> Pair {
    Pair::new(
        VenueId::from(venue),
        Address::repeat_byte(address),
        (a.clone(), BigUint::from(reserve_a)),
        (b.clone(), BigUint::from(reserve_b)),
    )
}

pub(crate) fn venue(id: &str) -> Venue {
    Venue {
        id: VenueId::from(id),
        router: Address::repeat_byte(0x77),
        factory: Address::repeat_byte(0x78),
        common_bases: Vec::new(),
        additional_bases: HashMap::new(),
        custom_bases: HashMap::new(),
    }
}

pub(crate) fn fees() -> FeeInputs {
    FeeInputs {
        gas_price_to_beat: BigUint::from(30_000_000_000u64),
        bribe_margin: 5,
    }
}

static TRACING: OnceLock<()> = OnceLock::new();

/// Routes `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub(crate) fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
