use std::{
    fmt::{self, Display},
    str::FromStr,
};

use alloy::primitives::Address;
use alloy_chains::{self, NamedChain};
use color_eyre::eyre::{self, Context, eyre};

use crate::currency::{Currency, NativeCurrency, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub metadata: alloy_chains::Chain,
    pub rpc_url: String,
    pub ws_url: String,
    pub wrapped_native: Address,
}

impl Chain {
    pub fn new(
        name: &str,
        rpc_url: &str,
        ws_url: &str,
        wrapped_native: &str,
    ) -> eyre::Result<Self> {
        let named = NamedChain::from_str(name).map_err(|_| eyre!("unknown chain {name}"))?;
        if !matches!(named, NamedChain::Mainnet | NamedChain::Sepolia) {
            return Err(eyre!("unsupported chain {name}"));
        }

        let wrapped_native =
            Address::from_str(wrapped_native).wrap_err("failed to parse wrapped native address")?;

        Ok(Self {
            metadata: alloy_chains::Chain::from_named(named),
            rpc_url: rpc_url.to_string(),
            ws_url: ws_url.to_string(),
            wrapped_native,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.metadata.id()
    }

    pub fn native(&self) -> Currency {
        Currency::Native(NativeCurrency::ether(self.chain_id()))
    }

    pub fn wrapped_native_token(&self) -> Token {
        Token::new(self.chain_id(), self.wrapped_native, 18, "WETH")
    }

    #[cfg(test)]
    pub fn eth_mainnet() -> Self {
        Self {
            metadata: alloy_chains::Chain::from_named(NamedChain::Mainnet),
            rpc_url: "https://mainnet.infura.io/v3/".to_string(),
            ws_url: "wss://mainnet.infura.io/ws/v3/".to_string(),
            wrapped_native: Address::from_str("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
                .expect("Couldn't convert to address"),
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id={})", self.metadata, self.chain_id())
    }
}
