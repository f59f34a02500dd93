//! Recomputes the best trade and its eligibility whenever the chain or the request changes.
//!
//! The chain of derivations is fee oracle, bribe estimate, route search, minimum trade gate and
//! validator. The last result is memoised on the block number and the request, so repeated
//! notifications for unchanged inputs never reach the pricer.
use std::sync::Arc;

use alloy::primitives::Address;
use num_bigint::BigUint;
use tracing::{debug, instrument, trace};

use crate::{
    amount::CurrencyAmount,
    approval::ApprovalState,
    bribe::{BribeEstimate, BribeEstimator},
    collector::ChainSnapshot,
    currency::Currency,
    fees::{BaseFeeEnvelope, FeeOracle},
    min_trade::MinTradeEstimate,
    preferences::Preferences,
    pricing::{FeeInputs, PairSource, Pricer},
    routing::{RouteSearch, TradeRequest, Venue},
    trade::{Trade, TradeType},
    validation::{SwapContext, ValidationError, Validator},
};

mod worker;
pub use worker::{Builder, Handle};

/// What the user has entered so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input: Option<Currency>,
    pub output: Option<Currency>,
    /// The exact side: input for exact-input, output for exact-output.
    pub amount: Option<CurrencyAmount>,
    pub trade_type: TradeType,
    /// Raw user input. `None` sends to the wallet itself.
    pub recipient: Option<String>,
    pub preferences: Preferences,
    /// Nonce of an approval for the input token that was already handed off.
    pub pending_approval: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Quote {
    pub block: Option<u64>,
    pub base_fee: Option<BaseFeeEnvelope>,
    pub priority_fee: Option<BigUint>,
    pub bribe: Option<BribeEstimate>,
    pub trade: Option<Trade>,
    /// Router of the venue the trade runs on.
    pub router: Option<Address>,
    /// The requested recipient, once it passed the recipient checks. `None` sends to the
    /// wallet.
    pub recipient: Option<Address>,
    pub min_trade: Option<MinTradeEstimate>,
    pub approval: ApprovalState,
    pub validation: Result<(), ValidationError>,
}

impl Quote {
    pub fn is_submittable(&self) -> bool {
        self.validation.is_ok()
    }
}

pub struct Quoter<P, S> {
    search: RouteSearch<P, S>,
    venues: Vec<Venue>,
    oracle: FeeOracle,
    bribes: BribeEstimator,
    validator: Validator,
    memo: Option<(Option<u64>, QuoteRequest, Arc<Quote>)>,
}

impl<P: Pricer, S: PairSource> Quoter<P, S> {
    pub fn new(
        search: RouteSearch<P, S>,
        venues: Vec<Venue>,
        oracle: FeeOracle,
        bribes: BribeEstimator,
        validator: Validator,
    ) -> Self {
        Self {
            search,
            venues,
            oracle,
            bribes,
            validator,
            memo: None,
        }
    }

    pub fn oracle(&self) -> &FeeOracle {
        &self.oracle
    }

    /// Quote for `request` at the snapshot's block.
    #[instrument(skip_all, fields(block.number = snapshot.block.number))]
    pub fn quote(&mut self, snapshot: &ChainSnapshot, request: &QuoteRequest) -> Arc<Quote> {
        self.oracle.observe(&snapshot.block);
        let block = self.oracle.latest_block();

        if let Some((memo_block, memo_request, quote)) = &self.memo {
            if *memo_block == block && memo_request == request {
                trace!("Inputs unchanged, reusing quote");
                return quote.clone();
            }
        }

        let quote = Arc::new(self.compute(snapshot, request, block));
        self.memo = Some((block, request.clone(), quote.clone()));
        quote
    }

    fn compute(
        &mut self,
        snapshot: &ChainSnapshot,
        request: &QuoteRequest,
        block: Option<u64>,
    ) -> Quote {
        let base_fee = self.oracle.base_fee();
        let priority_fee = self.oracle.priority_fee();
        let tip_setting = request.preferences.tip_setting(&self.bribes.tips);
        let bribe = self
            .bribes
            .estimate(self.search.pricer(), priority_fee.as_ref(), tip_setting);

        let fees = self.oracle.gas_price_to_beat().map(|gas_price_to_beat| FeeInputs {
            gas_price_to_beat,
            bribe_margin: self.bribes.tips.reconcile(request.preferences.tip_margin),
        });

        self.search
            .set_single_hop_only(request.preferences.single_hop_only);
        let trade_request = match (&request.input, &request.output, &request.amount) {
            (Some(input), Some(output), Some(amount)) => Some(TradeRequest {
                input: input.clone(),
                output: output.clone(),
                amount: amount.clone(),
                trade_type: request.trade_type,
            }),
            _ => None,
        };

        let trade = trade_request.as_ref().and_then(|trade_request| {
            self.search
                .best_trade_across(&self.venues, trade_request, fees.as_ref())
        });

        // the floor of the trade's venue, or the first venue that has one
        let venue = trade
            .as_ref()
            .and_then(|trade| self.venues.iter().find(|v| &v.id == trade.route().venue()));
        let min_trade = match (&request.input, &request.output) {
            (Some(input), Some(output)) => match venue {
                Some(venue) => self
                    .search
                    .min_trade_amount(venue, input, output, fees.as_ref()),
                None => self.venues.iter().find_map(|venue| {
                    self.search
                        .min_trade_amount(venue, input, output, fees.as_ref())
                }),
            },
            _ => None,
        };

        let router = venue.map(|venue| venue.router);
        let approval = self.approval(snapshot, request, trade.as_ref(), router);

        let recipient = request.recipient.as_deref().and_then(|recipient| {
            self.validator
                .check_recipient(recipient, trade.as_ref().map(Trade::route))
                .ok()
        });

        let slippage = request.preferences.slippage();
        let max_base_fee = base_fee.as_ref().map(|envelope| &envelope.max);
        let ctx = SwapContext {
            wallet: snapshot.balances.as_ref(),
            input: request.input.as_ref(),
            output: request.output.as_ref(),
            amount: request.amount.as_ref(),
            trade: trade.as_ref(),
            recipient: request.recipient.as_deref(),
            slippage: &slippage,
            min_trade: min_trade.as_ref(),
            max_base_fee,
            approval,
        };
        let validation = match self.validator.validate(&ctx) {
            // without a trade, report why the search could not price one
            Err(ValidationError::NoRoute) if fees.is_none() => {
                Err(ValidationError::FeeDataUnavailable)
            }
            Err(ValidationError::NoRoute) if below_floor(min_trade.as_ref(), request) => {
                Err(ValidationError::BelowMinimumTrade)
            }
            other => other,
        };

        debug!(
            trade = ?trade.as_ref().map(ToString::to_string),
            ?validation,
            ?approval,
            "Recomputed quote"
        );

        Quote {
            block,
            base_fee,
            priority_fee,
            bribe,
            trade,
            router,
            recipient,
            min_trade,
            approval,
            validation,
        }
    }

    fn approval(
        &self,
        snapshot: &ChainSnapshot,
        request: &QuoteRequest,
        trade: Option<&Trade>,
        router: Option<Address>,
    ) -> ApprovalState {
        let (Some(trade), Some(router)) = (trade, router) else {
            return ApprovalState::Unknown;
        };
        let Some(token) = trade.input_amount().currency().as_token() else {
            return ApprovalState::Approved;
        };
        let required = trade
            .maximum_amount_in(&request.preferences.slippage())
            .raw_unsigned();
        ApprovalState::from_allowance(
            snapshot.allowance(token.address, router),
            &required,
            request.pending_approval,
        )
    }
}

fn below_floor(min_trade: Option<&MinTradeEstimate>, request: &QuoteRequest) -> bool {
    match (min_trade, &request.amount) {
        (Some(min_trade), Some(amount)) => min_trade
            .is_below(amount, request.trade_type)
            .unwrap_or(false),
        _ => false,
    }
}
