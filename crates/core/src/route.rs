use std::{
    collections::HashSet,
    fmt::{self, Display},
};

use alloy::primitives::Address;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::currency::{Currency, Token};

/// Identifies one exchange venue, i.e. one independent set of pools on the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueId(String);

impl Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VenueId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for VenueId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A reserve snapshot of one pool, normalized to Uniswap's zero2one token order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub venue: VenueId,
    pub address: Address,
    token0: Token,
    token1: Token,
    reserve0: BigUint,
    reserve1: BigUint,
}

impl Pair {
    pub fn new(
        venue: VenueId,
        address: Address,
        (token_a, reserve_a): (Token, BigUint),
        (token_b, reserve_b): (Token, BigUint),
    ) -> Self {
        if token_a.sorts_before(&token_b) {
            Self {
                venue,
                address,
                token0: token_a,
                token1: token_b,
                reserve0: reserve_a,
                reserve1: reserve_b,
            }
        } else {
            Self {
                venue,
                address,
                token0: token_b,
                token1: token_a,
                reserve0: reserve_b,
                reserve1: reserve_a,
            }
        }
    }

    pub fn token0(&self) -> &Token {
        &self.token0
    }

    pub fn token1(&self) -> &Token {
        &self.token1
    }

    pub fn reserve_of(&self, token: &Token) -> Option<&BigUint> {
        if token == &self.token0 {
            Some(&self.reserve0)
        } else if token == &self.token1 {
            Some(&self.reserve1)
        } else {
            None
        }
    }

    pub fn involves(&self, token: &Token) -> bool {
        token == &self.token0 || token == &self.token1
    }

    pub fn other(&self, token: &Token) -> Option<&Token> {
        if token == &self.token0 {
            Some(&self.token1)
        } else if token == &self.token1 {
            Some(&self.token0)
        } else {
            None
        }
    }
}

impl Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}@{}", self.token0, self.token1, self.venue)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route must contain at least one pair")]
    Empty,
    #[error("pair {pair} does not connect to {token}")]
    BrokenChain { pair: String, token: String },
    #[error("token {0} appears more than once in route")]
    Cycle(String),
    #[error("route ends at {actual}, expected {expected}")]
    WrongOutput { expected: String, actual: String },
    #[error("route mixes venues {0} and {1}")]
    MixedVenues(VenueId, VenueId),
}

/// An ordered list of pairs connecting `input` to `output`.
///
/// Consecutive pairs share a token and no token is visited twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pairs: Vec<Pair>,
    path: Vec<Token>,
    input: Currency,
    output: Currency,
}

impl Route {
    pub fn new(
        pairs: Vec<Pair>,
        input: Currency,
        output: Currency,
        wrapped_native: &Token,
    ) -> Result<Self, RouteError> {
        let first = pairs.first().ok_or(RouteError::Empty)?;
        let venue = first.venue.clone();

        let mut current = input.wrapped(wrapped_native).clone();
        let mut path = vec![current.clone()];
        let mut seen = HashSet::from([current.clone()]);

        for pair in &pairs {
            if pair.venue != venue {
                return Err(RouteError::MixedVenues(venue, pair.venue.clone()));
            }
            let next = pair
                .other(&current)
                .ok_or_else(|| RouteError::BrokenChain {
                    pair: pair.to_string(),
                    token: current.to_string(),
                })?
                .clone();
            if !seen.insert(next.clone()) {
                return Err(RouteError::Cycle(next.to_string()));
            }
            path.push(next.clone());
            current = next;
        }

        let expected = output.wrapped(wrapped_native);
        if &current != expected {
            return Err(RouteError::WrongOutput {
                expected: expected.to_string(),
                actual: current.to_string(),
            });
        }

        Ok(Self {
            pairs,
            path,
            input,
            output,
        })
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn path(&self) -> &[Token] {
        &self.path
    }

    pub fn input(&self) -> &Currency {
        &self.input
    }

    pub fn output(&self) -> &Currency {
        &self.output
    }

    pub fn venue(&self) -> &VenueId {
        &self.pairs[0].venue
    }

    pub fn hops(&self) -> usize {
        self.pairs.len()
    }

    /// Every token and pool contract the route touches.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.path
            .iter()
            .map(|token| token.address)
            .chain(self.pairs.iter().map(|pair| pair.address))
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols: Vec<&str> = self.path.iter().map(|token| token.symbol.as_str()).collect();
        write!(f, "{} via {}", symbols.join(" -> "), self.venue())
    }
}
