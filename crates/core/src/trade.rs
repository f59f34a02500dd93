use std::{
    cmp::Ordering,
    fmt::{self, Display},
};

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    amount::{self, AmountError, CurrencyAmount, Percent, Price},
    route::Route,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    ExactInput,
    ExactOutput,
}

impl Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::ExactInput => write!(f, "exact input"),
            TradeType::ExactOutput => write!(f, "exact output"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TradeError {
    #[error("trades are not comparable")]
    NotComparable,
    #[error("trade amount does not match route: {0}")]
    RouteMismatch(String),
    #[error("trade input amount must be non-zero")]
    ZeroInput,
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// A candidate execution over one route.
///
/// All fields are fixed at construction; a new quote always produces a new `Trade`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    route: Route,
    trade_type: TradeType,
    input_amount: CurrencyAmount,
    output_amount: CurrencyAmount,
    miner_bribe: CurrencyAmount,
    estimated_gas: u64,
    execution_price: Price,
}

impl Trade {
    pub fn new(
        route: Route,
        trade_type: TradeType,
        input_amount: CurrencyAmount,
        output_amount: CurrencyAmount,
        miner_bribe: CurrencyAmount,
        estimated_gas: u64,
    ) -> Result<Self, TradeError> {
        if input_amount.currency() != route.input() {
            return Err(TradeError::RouteMismatch(format!(
                "input {} vs route {}",
                input_amount.currency(),
                route.input()
            )));
        }
        if output_amount.currency() != route.output() {
            return Err(TradeError::RouteMismatch(format!(
                "output {} vs route {}",
                output_amount.currency(),
                route.output()
            )));
        }
        if input_amount.is_zero() {
            return Err(TradeError::ZeroInput);
        }

        let execution_price = Price::from_amounts(&input_amount, &output_amount);
        Ok(Self {
            route,
            trade_type,
            input_amount,
            output_amount,
            miner_bribe,
            estimated_gas,
            execution_price,
        })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn trade_type(&self) -> TradeType {
        self.trade_type
    }

    pub fn input_amount(&self) -> &CurrencyAmount {
        &self.input_amount
    }

    pub fn output_amount(&self) -> &CurrencyAmount {
        &self.output_amount
    }

    pub fn miner_bribe(&self) -> &CurrencyAmount {
        &self.miner_bribe
    }

    pub fn estimated_gas(&self) -> u64 {
        self.estimated_gas
    }

    pub fn execution_price(&self) -> &Price {
        &self.execution_price
    }

    /// The least output accepted under `slippage`. Exact-output trades return the output as is.
    pub fn minimum_amount_out(&self, slippage: &Percent) -> CurrencyAmount {
        match self.trade_type {
            TradeType::ExactOutput => self.output_amount.clone(),
            TradeType::ExactInput => {
                let factor = (&amount::one() + slippage.as_fraction()).invert();
                let adjusted = self.output_amount.multiply(&factor);
                CurrencyAmount::from_raw(adjusted.currency().clone(), adjusted.raw())
            }
        }
    }

    /// The most input spent under `slippage`. Exact-input trades return the input as is.
    pub fn maximum_amount_in(&self, slippage: &Percent) -> CurrencyAmount {
        match self.trade_type {
            TradeType::ExactInput => self.input_amount.clone(),
            TradeType::ExactOutput => {
                let factor = &amount::one() + slippage.as_fraction();
                let adjusted = self.input_amount.multiply(&factor);
                CurrencyAmount::from_raw(adjusted.currency().clone(), adjusted.raw())
            }
        }
    }

    /// Raw input and output as on-chain integers.
    pub fn raw_amounts(&self, slippage: &Percent) -> (BigInt, BigInt) {
        (
            self.maximum_amount_in(slippage).raw(),
            self.minimum_amount_out(slippage).raw(),
        )
    }
}

impl Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade({} -> {}, {}, route: {}, bribe: {}, gas: {})",
            self.input_amount,
            self.output_amount,
            self.trade_type,
            self.route,
            self.miner_bribe,
            self.estimated_gas
        )
    }
}

/// Whether `candidate` beats `incumbent`.
///
/// A candidate replaces an incumbent only if its execution price is more than `minimum_delta`
/// above the incumbent's. Returns `Ok(None)` when neither trade exists.
pub fn is_trade_better(
    incumbent: Option<&Trade>,
    candidate: Option<&Trade>,
    minimum_delta: &Percent,
) -> Result<Option<bool>, TradeError> {
    let (incumbent, candidate) = match (incumbent, candidate) {
        (Some(_), None) => return Ok(Some(false)),
        (None, Some(_)) => return Ok(Some(true)),
        (None, None) => return Ok(None),
        (Some(a), Some(b)) => (a, b),
    };

    if incumbent.trade_type != candidate.trade_type
        || incumbent.input_amount.currency() != candidate.input_amount.currency()
        || incumbent.output_amount.currency() != candidate.output_amount.currency()
    {
        return Err(TradeError::NotComparable);
    }

    if minimum_delta.is_zero() {
        let ordering = incumbent
            .execution_price
            .try_cmp(&candidate.execution_price)?;
        return Ok(Some(ordering == Ordering::Less));
    }

    let scaled = incumbent.execution_price.as_fraction()
        * &(&amount::one() + minimum_delta.as_fraction());
    Ok(Some(scaled < *candidate.execution_price.as_fraction()))
}
