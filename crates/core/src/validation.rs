//! Submittability checks for a quoted trade.
//!
//! Rules run in a fixed order and the first failure is reported; later rules are not evaluated.
use std::collections::{HashMap, HashSet};

use alloy::primitives::Address;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    amount::{CurrencyAmount, Percent},
    approval::ApprovalState,
    currency::Currency,
    min_trade::MinTradeEstimate,
    route::Route,
    trade::Trade,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("connect a wallet")]
    NoWallet,
    #[error("enter an amount")]
    NoAmount,
    #[error("select a token")]
    NoCurrencySelected,
    #[error("invalid recipient")]
    InvalidRecipient,
    #[error("insufficient token balance")]
    InsufficientTokenBalance,
    #[error("insufficient balance to cover gas, bribe and input")]
    InsufficientNativeBalance,
    #[error("trade amount too small to cover fees")]
    BelowMinimumTrade,
    #[error("fee data unavailable")]
    FeeDataUnavailable,
    #[error("insufficient liquidity for this trade")]
    NoRoute,
    /// The floor was priced for another pair than the amount.
    #[error("minimum trade does not match the traded currency")]
    CurrencyMismatch,
}

/// Balances of the connected wallet at one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletBalances {
    pub native: BigUint,
    pub tokens: HashMap<Address, BigUint>,
}

impl WalletBalances {
    pub fn balance_of(&self, currency: &Currency) -> BigUint {
        match currency {
            Currency::Native(_) => self.native.clone(),
            Currency::Token(token) => self.tokens.get(&token.address).cloned().unwrap_or_default(),
        }
    }
}

/// Everything the rules look at for one attempt. `None` means the value is not known yet.
#[derive(Debug, Clone, Copy)]
pub struct SwapContext<'a> {
    /// `None` while no wallet is connected.
    pub wallet: Option<&'a WalletBalances>,
    pub input: Option<&'a Currency>,
    pub output: Option<&'a Currency>,
    /// The parsed amount the user typed.
    pub amount: Option<&'a CurrencyAmount>,
    pub trade: Option<&'a Trade>,
    /// `None` sends the output back to the wallet.
    pub recipient: Option<&'a str>,
    pub slippage: &'a Percent,
    pub min_trade: Option<&'a MinTradeEstimate>,
    /// Highest base fee reachable within the fee lookahead.
    pub max_base_fee: Option<&'a BigUint>,
    pub approval: ApprovalState,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    blacklist: HashSet<Address>,
    approval_gas: u64,
}

impl Validator {
    pub fn new(blacklist: impl IntoIterator<Item = Address>, approval_gas: u64) -> Self {
        Self {
            blacklist: blacklist.into_iter().collect(),
            approval_gas,
        }
    }

    pub fn validate(&self, ctx: &SwapContext<'_>) -> Result<(), ValidationError> {
        let wallet = ctx.wallet.ok_or(ValidationError::NoWallet)?;

        let amount = ctx
            .amount
            .filter(|amount| !amount.is_zero())
            .ok_or(ValidationError::NoAmount)?;

        let (Some(input), Some(_)) = (ctx.input, ctx.output) else {
            return Err(ValidationError::NoCurrencySelected);
        };

        if let Some(recipient) = ctx.recipient {
            self.check_recipient(recipient, ctx.trade.map(Trade::route))?;
        }

        let trade = ctx.trade.ok_or(ValidationError::NoRoute)?;

        let max_in = trade.maximum_amount_in(ctx.slippage).raw_unsigned();
        if wallet.balance_of(input) < max_in {
            return Err(if input.is_native() {
                ValidationError::InsufficientNativeBalance
            } else {
                ValidationError::InsufficientTokenBalance
            });
        }

        let min_trade = ctx.min_trade.ok_or(ValidationError::FeeDataUnavailable)?;
        if min_trade
            .is_below(amount, trade.trade_type())
            .map_err(|_| ValidationError::CurrencyMismatch)?
        {
            return Err(ValidationError::BelowMinimumTrade);
        }

        let max_base_fee = ctx.max_base_fee.ok_or(ValidationError::FeeDataUnavailable)?;
        let required = native_requirement(
            trade,
            ctx.slippage,
            max_base_fee,
            ctx.approval,
            self.approval_gas,
        );
        if wallet.native < required {
            debug!(balance = %wallet.native, %required, "Native balance short of requirement");
            return Err(ValidationError::InsufficientNativeBalance);
        }

        Ok(())
    }

    /// Parses `recipient` and rejects blacklisted contracts and addresses inside `route`.
    pub fn check_recipient(
        &self,
        recipient: &str,
        route: Option<&Route>,
    ) -> Result<Address, ValidationError> {
        let address: Address = recipient
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidRecipient)?;

        if address.is_zero() || self.blacklist.contains(&address) {
            return Err(ValidationError::InvalidRecipient);
        }
        if route.is_some_and(|route| route.addresses().any(|a| a == address)) {
            return Err(ValidationError::InvalidRecipient);
        }
        Ok(address)
    }
}

/// Native currency the wallet must hold to land `trade`.
///
/// Covers swap gas at `max_base_fee`, approval gas at the same price when the input token still
/// needs an approval, the miner bribe, and the slippage-adjusted input when the input is native.
pub fn native_requirement(
    trade: &Trade,
    slippage: &Percent,
    max_base_fee: &BigUint,
    approval: ApprovalState,
    approval_gas: u64,
) -> BigUint {
    let input = trade.input_amount().currency();

    let mut gas = trade.estimated_gas();
    if !input.is_native() && approval.needs_approval() {
        gas = gas.saturating_add(approval_gas);
    }

    let mut required = max_base_fee * BigUint::from(gas) + trade.miner_bribe().raw_unsigned();
    if input.is_native() {
        required += trade.maximum_amount_in(slippage).raw_unsigned();
    }
    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        currency::Token,
        routing::{RouteSearch, RoutingSettings, TradeRequest},
        testing::{FakePairSource, FakePricer, fees, pair, venue},
        trade::{
            TradeType,
            tests::{eth, make_trade, token, weth},
        },
    };

    fn router() -> Address {
        Address::repeat_byte(0x77)
    }

    struct Fixture {
        a: Token,
        b: Token,
        trade: Trade,
        amount: CurrencyAmount,
        wallet: WalletBalances,
        min_trade: MinTradeEstimate,
        max_base_fee: BigUint,
        slippage: Percent,
    }

    impl Fixture {
        fn new() -> Self {
            let (a, b) = (token(0x01, "A"), token(0x02, "B"));
            let trade = make_trade(&[&a, &b], TradeType::ExactInput, 1_000, 2_000);
            let amount = trade.input_amount().clone();
            let wallet = WalletBalances {
                native: BigUint::from(10u64).pow(18),
                tokens: HashMap::from([(a.address, BigUint::from(1_000u32))]),
            };
            let min_trade = MinTradeEstimate {
                exact_input: CurrencyAmount::from_raw(a.clone().into(), 100),
                exact_output: CurrencyAmount::from_raw(b.clone().into(), 100),
            };
            Self {
                a,
                b,
                trade,
                amount,
                wallet,
                min_trade,
                max_base_fee: BigUint::from(10u32),
                slippage: Percent::from_bps(50),
            }
        }

        fn requirement(&self, trade: &Trade, approval: ApprovalState) -> BigUint {
            native_requirement(trade, &self.slippage, &self.max_base_fee, approval, 50_000)
        }

        fn ctx(&self) -> SwapContext<'_> {
            SwapContext {
                wallet: Some(&self.wallet),
                input: Some(self.trade.input_amount().currency()),
                output: Some(self.trade.output_amount().currency()),
                amount: Some(&self.amount),
                trade: Some(&self.trade),
                recipient: None,
                slippage: &self.slippage,
                min_trade: Some(&self.min_trade),
                max_base_fee: Some(&self.max_base_fee),
                approval: ApprovalState::Approved,
            }
        }
    }

    fn validator() -> Validator {
        Validator::new([router()], 50_000)
    }

    #[test]
    fn floor_in_other_currency_is_a_mismatch() {
        let mut f = Fixture::new();
        f.min_trade.exact_input = CurrencyAmount::from_raw(f.b.clone().into(), 100);
        assert_eq!(validator().validate(&f.ctx()), Err(ValidationError::CurrencyMismatch));
    }

    #[test]
    fn first_failure_wins() {
        let f = Fixture::new();
        let v = validator();
        assert_eq!(v.validate(&f.ctx()), Ok(()));

        // no wallet beats every other failure
        let ctx = SwapContext {
            wallet: None,
            amount: None,
            input: None,
            recipient: Some("garbage"),
            ..f.ctx()
        };
        assert_eq!(v.validate(&ctx), Err(ValidationError::NoWallet));

        let ctx = SwapContext {
            amount: None,
            input: None,
            ..f.ctx()
        };
        assert_eq!(v.validate(&ctx), Err(ValidationError::NoAmount));

        let zero = CurrencyAmount::zero(f.a.clone().into());
        let ctx = SwapContext {
            amount: Some(&zero),
            ..f.ctx()
        };
        assert_eq!(v.validate(&ctx), Err(ValidationError::NoAmount));

        let ctx = SwapContext {
            output: None,
            recipient: Some("garbage"),
            ..f.ctx()
        };
        assert_eq!(v.validate(&ctx), Err(ValidationError::NoCurrencySelected));

        let ctx = SwapContext {
            trade: None,
            ..f.ctx()
        };
        assert_eq!(v.validate(&ctx), Err(ValidationError::NoRoute));
    }

    #[test]
    fn recipient_rules() {
        let f = Fixture::new();
        let v = validator();
        let route = f.trade.route();

        let fresh = "0x1111111111111111111111111111111111111111";
        assert!(v.check_recipient(fresh, Some(route)).is_ok());
        assert_eq!(
            v.check_recipient("not an address", Some(route)),
            Err(ValidationError::InvalidRecipient)
        );
        assert_eq!(
            v.check_recipient(&router().to_string(), None),
            Err(ValidationError::InvalidRecipient)
        );
        // the output token itself and the pool contract are both off limits
        assert_eq!(
            v.check_recipient(&f.b.address.to_string(), Some(route)),
            Err(ValidationError::InvalidRecipient)
        );
        let pool = route.pairs()[0].address.to_string();
        assert_eq!(v.check_recipient(&pool, Some(route)), Err(ValidationError::InvalidRecipient));
    }

    #[test]
    fn token_balance_covers_slippage_adjusted_input() {
        let (a, b) = (token(0x01, "A"), token(0x02, "B"));
        let mut f = Fixture::new();
        f.trade = make_trade(&[&a, &b], TradeType::ExactOutput, 1_000, 2_000);
        f.amount = f.trade.output_amount().clone();
        f.slippage = Percent::from_bps(100);
        let v = validator();

        // needs 1010 of A
        f.wallet.tokens.insert(a.address, BigUint::from(1_009u32));
        assert_eq!(v.validate(&f.ctx()), Err(ValidationError::InsufficientTokenBalance));
        f.wallet.tokens.insert(a.address, BigUint::from(1_010u32));
        assert_eq!(v.validate(&f.ctx()), Ok(()));
    }

    #[test]
    fn below_minimum_and_missing_fee_data() {
        let mut f = Fixture::new();
        let v = validator();

        f.min_trade.exact_input = CurrencyAmount::from_raw(f.a.clone().into(), 1_001);
        assert_eq!(v.validate(&f.ctx()), Err(ValidationError::BelowMinimumTrade));

        let f = Fixture::new();
        let ctx = SwapContext {
            min_trade: None,
            ..f.ctx()
        };
        assert_eq!(v.validate(&ctx), Err(ValidationError::FeeDataUnavailable));
        let ctx = SwapContext {
            max_base_fee: None,
            ..f.ctx()
        };
        assert_eq!(v.validate(&ctx), Err(ValidationError::FeeDataUnavailable));
    }

    #[test]
    fn native_balance_boundary() {
        let mut f = Fixture::new();
        let v = validator();

        // 150k gas at 10 wei + 1000 wei bribe
        let required = f.requirement(&f.trade, ApprovalState::Approved);
        assert_eq!(required, BigUint::from(1_501_000u32));

        f.wallet.native = &required - 1u32;
        assert_eq!(v.validate(&f.ctx()), Err(ValidationError::InsufficientNativeBalance));
        f.wallet.native = required;
        assert_eq!(v.validate(&f.ctx()), Ok(()));
    }

    #[test]
    fn approval_gas_and_native_input_are_added() {
        let f = Fixture::new();
        let with_approval = f.requirement(&f.trade, ApprovalState::NotApproved);
        assert_eq!(with_approval, BigUint::from(2_001_000u32));
        let pending = f.requirement(&f.trade, ApprovalState::Pending { nonce: 4 });
        assert_eq!(pending, BigUint::from(1_501_000u32));

        let b = token(0x02, "B");
        let weth = weth();
        let native_in = {
            let t = make_trade(&[&weth, &b], TradeType::ExactInput, 7_000, 2_000);
            let pairs = t.route().pairs().to_vec();
            let route = Route::new(pairs, eth(), b.clone().into(), &weth).unwrap();
            Trade::new(
                route,
                TradeType::ExactInput,
                CurrencyAmount::from_raw(eth(), 7_000),
                CurrencyAmount::from_raw(b.into(), 2_000),
                CurrencyAmount::from_raw(eth(), 1_000),
                150_000,
            )
            .unwrap()
        };
        // native input never needs an approval
        let required = f.requirement(&native_in, ApprovalState::NotApproved);
        assert_eq!(required, BigUint::from(1_508_000u32));
    }

    fn scenario(native: u64, recipient: Option<&str>) -> Result<(), ValidationError> {
        let (a, b) = (token(0x01, "A"), token(0x02, "B"));
        let search = RouteSearch::new(
            FakePricer {
                min_trade: Some((1_000, 1_000)),
                ..FakePricer::default()
            },
            FakePairSource::new(vec![pair(
                "uniswap",
                &a,
                &b,
                5_000_000_000_000_000_000,
                10_000_000_000_000_000_000,
                0xa1,
            )]),
            weth(),
            RoutingSettings::default(),
        );
        let v = venue("uniswap");
        let mut fee_inputs = fees();
        fee_inputs.gas_price_to_beat = BigUint::default();

        let one_a = CurrencyAmount::from_raw(a.clone().into(), 10u64.pow(18));
        let request = TradeRequest::exact_input(one_a.clone(), b.clone().into());
        let trade = search.best_trade(&v, &request, Some(&fee_inputs)).unwrap();
        assert_eq!(trade.route().hops(), 1);

        let min_trade = search
            .min_trade_amount(&v, &request.input, &request.output, Some(&fee_inputs))
            .unwrap();
        assert!(!min_trade.is_below(&one_a, TradeType::ExactInput).unwrap());

        let wallet = WalletBalances {
            native: BigUint::from(native),
            tokens: HashMap::from([(a.address, BigUint::from(10u64.pow(18)))]),
        };
        let slippage = Percent::from_bps(50);
        let max_base_fee = BigUint::default();
        let ctx = SwapContext {
            wallet: Some(&wallet),
            input: Some(&request.input),
            output: Some(&request.output),
            amount: Some(&one_a),
            trade: Some(&trade),
            recipient,
            slippage: &slippage,
            min_trade: Some(&min_trade),
            max_base_fee: Some(&max_base_fee),
            approval: ApprovalState::Approved,
        };
        Validator::new([v.router], 50_000).validate(&ctx)
    }

    #[test]
    fn scenario_single_hop_trade_is_submittable() {
        assert_eq!(scenario(10u64.pow(18), None), Ok(()));
    }

    #[test]
    fn scenario_empty_native_balance() {
        assert_eq!(scenario(0, None), Err(ValidationError::InsufficientNativeBalance));
    }

    #[test]
    fn scenario_router_as_recipient() {
        let router = venue("uniswap").router.to_string();
        assert_eq!(scenario(0, Some(&router)), Err(ValidationError::InvalidRecipient));
        assert_eq!(scenario(10u64.pow(18), Some(&router)), Err(ValidationError::InvalidRecipient));
    }
}
