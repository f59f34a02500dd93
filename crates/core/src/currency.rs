use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// An ERC-20 token on a specific chain.
///
/// Two tokens are equal when they share a chain id and contract address; decimals and symbol are
/// metadata only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl Token {
    pub fn new(chain_id: u64, address: Address, decimals: u8, symbol: &str) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.to_ascii_uppercase(),
        }
    }

    /// Uniswap-style pair ordering: the token with the lower address sorts first.
    pub fn sorts_before(&self, other: &Token) -> bool {
        self.address < other.address
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub chain_id: u64,
    pub decimals: u8,
    pub symbol: String,
}

impl NativeCurrency {
    pub fn ether(chain_id: u64) -> Self {
        Self {
            chain_id,
            decimals: 18,
            symbol: "ETH".to_string(),
        }
    }
}

/// Either the chain's native asset or an ERC-20 token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Currency {
    Native(NativeCurrency),
    Token(Token),
}

impl Currency {
    pub fn is_native(&self) -> bool {
        matches!(self, Currency::Native(_))
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Currency::Native(native) => native.decimals,
            Currency::Token(token) => token.decimals,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Currency::Native(native) => &native.symbol,
            Currency::Token(token) => &token.symbol,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Currency::Native(native) => native.chain_id,
            Currency::Token(token) => token.chain_id,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Currency::Native(_) => None,
            Currency::Token(token) => Some(token),
        }
    }

    /// The token this currency trades as inside pools. Native currency routes through the
    /// chain's wrapped native token.
    pub fn wrapped<'a>(&'a self, wrapped_native: &'a Token) -> &'a Token {
        match self {
            Currency::Native(_) => wrapped_native,
            Currency::Token(token) => token,
        }
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Currency::Native(_), Currency::Native(_)) => true,
            (Currency::Token(a), Currency::Token(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Currency {}

impl Hash for Currency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Currency::Native(_) => 0u8.hash(state),
            Currency::Token(token) => {
                1u8.hash(state);
                token.hash(state);
            }
        }
    }
}

impl From<Token> for Currency {
    fn from(token: Token) -> Self {
        Currency::Token(token)
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
