//! Exact rational arithmetic for token amounts and prices.
//!
//! Amounts are stored in the currency's smallest unit as a `BigInt` fraction so that slippage
//! and price comparisons never round through floating point. Quotients truncate toward zero.
use std::{
    cmp::Ordering,
    fmt::{self, Display},
    ops::{Add, Mul, Sub},
};

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Signed, Zero};
use thiserror::Error;

use crate::currency::Currency;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

#[derive(Debug, Clone)]
pub struct Fraction {
    numerator: BigInt,
    denominator: BigInt,
}

impl Fraction {
    /// # Panics
    /// Panics if `denominator` is zero.
    pub fn new(numerator: impl Into<BigInt>, denominator: impl Into<BigInt>) -> Self {
        let (numerator, denominator) = (numerator.into(), denominator.into());
        assert!(!denominator.is_zero(), "fraction denominator must be non-zero");
        if denominator.is_negative() {
            Self {
                numerator: -numerator,
                denominator: -denominator,
            }
        } else {
            Self {
                numerator,
                denominator,
            }
        }
    }

    pub fn from_integer(value: impl Into<BigInt>) -> Self {
        Self::new(value, 1)
    }

    pub fn numerator(&self) -> &BigInt {
        &self.numerator
    }

    pub fn denominator(&self) -> &BigInt {
        &self.denominator
    }

    pub fn quotient(&self) -> BigInt {
        &self.numerator / &self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    pub fn invert(&self) -> Self {
        Self::new(self.denominator.clone(), self.numerator.clone())
    }
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fraction {}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        // denominators are kept positive, so cross multiplication preserves order
        (&self.numerator * &other.denominator).cmp(&(&other.numerator * &self.denominator))
    }
}

impl Add for &Fraction {
    type Output = Fraction;

    fn add(self, rhs: Self) -> Fraction {
        if self.denominator == rhs.denominator {
            return Fraction::new(&self.numerator + &rhs.numerator, self.denominator.clone());
        }
        Fraction::new(
            &self.numerator * &rhs.denominator + &rhs.numerator * &self.denominator,
            &self.denominator * &rhs.denominator,
        )
    }
}

impl Sub for &Fraction {
    type Output = Fraction;

    fn sub(self, rhs: Self) -> Fraction {
        if self.denominator == rhs.denominator {
            return Fraction::new(&self.numerator - &rhs.numerator, self.denominator.clone());
        }
        Fraction::new(
            &self.numerator * &rhs.denominator - &rhs.numerator * &self.denominator,
            &self.denominator * &rhs.denominator,
        )
    }
}

impl Mul for &Fraction {
    type Output = Fraction;

    fn mul(self, rhs: Self) -> Fraction {
        Fraction::new(
            &self.numerator * &rhs.numerator,
            &self.denominator * &rhs.denominator,
        )
    }
}

impl Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A percentage backed by a [`Fraction`], usually built from basis points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(Fraction);

impl Percent {
    pub fn from_bps(bps: u64) -> Self {
        Self(Fraction::new(bps, 10_000))
    }

    pub fn zero() -> Self {
        Self::from_bps(0)
    }

    pub fn one_hundred() -> Self {
        Self::from_bps(10_000)
    }

    pub fn as_fraction(&self) -> &Fraction {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths: BigInt = (self.0.numerator() * 10_000u32) / self.0.denominator();
        write!(f, "{}.{:02}%", &hundredths / 100u32, (&hundredths % 100u32).abs())
    }
}

/// An amount of a specific currency, in its smallest unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyAmount {
    currency: Currency,
    fraction: Fraction,
}

impl CurrencyAmount {
    pub fn from_raw(currency: Currency, raw: impl Into<BigInt>) -> Self {
        Self {
            currency,
            fraction: Fraction::from_integer(raw),
        }
    }

    pub fn from_fraction(currency: Currency, fraction: Fraction) -> Self {
        Self { currency, fraction }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::from_raw(currency, BigInt::zero())
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn as_fraction(&self) -> &Fraction {
        &self.fraction
    }

    /// The integer number of smallest units, truncated.
    pub fn raw(&self) -> BigInt {
        self.fraction.quotient()
    }

    /// The raw amount clamped at zero, for places that need an unsigned on-chain value.
    pub fn raw_unsigned(&self) -> BigUint {
        self.raw().to_biguint().unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        self.raw().is_zero()
    }

    fn ensure_same_currency(&self, other: &Self) -> Result<(), AmountError> {
        if self.currency != other.currency {
            return Err(AmountError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, AmountError> {
        self.ensure_same_currency(other)?;
        Ok(Self {
            currency: self.currency.clone(),
            fraction: &self.fraction + &other.fraction,
        })
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, AmountError> {
        self.ensure_same_currency(other)?;
        Ok(Self {
            currency: self.currency.clone(),
            fraction: &self.fraction - &other.fraction,
        })
    }

    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, AmountError> {
        self.ensure_same_currency(other)?;
        Ok(self.fraction.cmp(&other.fraction))
    }

    pub fn multiply(&self, factor: &Fraction) -> Self {
        Self {
            currency: self.currency.clone(),
            fraction: &self.fraction * factor,
        }
    }

    /// Human readable amount using the currency's decimals, e.g. `1.5`.
    pub fn to_exact(&self) -> String {
        let raw = self.raw();
        let scale = BigInt::from(10u8).pow(u32::from(self.currency.decimals()));
        let (sign, magnitude) = (raw.sign(), raw.abs());
        let whole = &magnitude / &scale;
        let remainder = &magnitude % &scale;
        let prefix = if sign == Sign::Minus { "-" } else { "" };
        if remainder.is_zero() {
            return format!("{prefix}{whole}");
        }
        let fractional = format!(
            "{:0>width$}",
            remainder.to_string(),
            width = usize::from(self.currency.decimals())
        );
        format!("{prefix}{whole}.{}", fractional.trim_end_matches('0'))
    }
}

impl Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_exact(), self.currency)
    }
}

/// Quote currency per unit of base currency, in raw units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    base: Currency,
    quote: Currency,
    fraction: Fraction,
}

impl Price {
    /// # Panics
    /// Panics if `base_amount` is zero.
    pub fn from_amounts(base_amount: &CurrencyAmount, quote_amount: &CurrencyAmount) -> Self {
        Self {
            base: base_amount.currency().clone(),
            quote: quote_amount.currency().clone(),
            fraction: Fraction::new(
                quote_amount.as_fraction().numerator() * base_amount.as_fraction().denominator(),
                quote_amount.as_fraction().denominator() * base_amount.as_fraction().numerator(),
            ),
        }
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    pub fn quote(&self) -> &Currency {
        &self.quote
    }

    pub fn as_fraction(&self) -> &Fraction {
        &self.fraction
    }

    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, AmountError> {
        if self.base != other.base {
            return Err(AmountError::CurrencyMismatch {
                left: self.base.to_string(),
                right: other.base.to_string(),
            });
        }
        if self.quote != other.quote {
            return Err(AmountError::CurrencyMismatch {
                left: self.quote.to_string(),
                right: other.quote.to_string(),
            });
        }
        Ok(self.fraction.cmp(&other.fraction))
    }
}

impl Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.fraction, self.quote, self.base)
    }
}

pub(crate) fn one() -> Fraction {
    Fraction::new(BigInt::one(), BigInt::one())
}
