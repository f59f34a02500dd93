use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy::primitives::Address;
use color_eyre::eyre::{self, Context as _, OptionExt as _, eyre};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{
    amount::Percent,
    bribe::TipSettings,
    chain::Chain,
    currency::{Currency, Token},
    fees::FeeOracle,
    route::VenueId,
    routing::{MAX_HOPS, RoutingSettings, Venue},
    swap::{SubmissionSettings, gas::DEFAULT_GAS_MARGIN_BPS},
    validation::Validator,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,

    /// Account whose balances and allowances are watched
    #[serde(default)]
    pub account: Option<Address>,

    /// Tradeable tokens by symbol
    pub tokens: HashMap<String, TokenConfig>,

    /// Exchanges searched for trades
    pub venues: Vec<VenueConfig>,

    #[serde(default)]
    pub fees: FeeConfig,

    /// Bribe margin presets
    #[serde(default)]
    pub tips: TipSettings,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Websocket endpoint of the private relay
    pub relay_url: String,

    /// Addresses that may never receive a swap. Routers and factories are always included.
    #[serde(default)]
    pub blacklist: Vec<Address>,

    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain name as known to alloy-chains, e.g. `mainnet`
    pub name: String,
    pub rpc_url: String,
    pub ws_url: String,
    pub wrapped_native: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub id: String,
    pub router: Address,
    pub factory: Address,

    /// Symbols tried as intermediates for every pair
    #[serde(default)]
    pub common_bases: Vec<String>,

    /// Extra intermediates per traded token symbol
    #[serde(default)]
    pub additional_bases: HashMap<String, Vec<String>>,

    /// Exclusive pairing partners per token symbol
    #[serde(default)]
    pub custom_bases: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Blocks of maximal base fee change the envelope covers
    pub blocks_ahead: u32,
    /// Blocks averaged for the priority fee sample
    pub window: usize,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            blocks_ahead: 3,
            window: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Improvement a longer route needs over a shorter one
    pub better_trade_threshold_bps: u64,
    pub max_hops: usize,
    /// Margin passed to the minimum trade estimate
    pub min_trade_margin: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            better_trade_threshold_bps: 50,
            max_hops: MAX_HOPS,
            min_trade_margin: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub gas_margin_bps: u64,
    /// Gas assumed for an approval when it cannot be estimated
    pub approval_gas: u64,
    #[serde(with = "humantime_str")]
    pub ttl: Duration,
    pub allow_fee_on_transfer: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            gas_margin_bps: DEFAULT_GAS_MARGIN_BPS,
            approval_gas: 50_000,
            ttl: Duration::from_secs(120),
            allow_fee_on_transfer: false,
        }
    }
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("veilswap-preferences.json")
}

/// Durations as humantime strings such as `20m`.
pub(crate) mod humantime_str {
    use std::time::Duration;

    use serde::{Deserialize as _, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

impl Config {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("veilswap.yaml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        let config: Config = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("VEILSWAP_").split("__"))
            .extract()?;

        Ok(config)
    }

    pub fn chain(&self) -> eyre::Result<Chain> {
        let ChainConfig {
            name,
            rpc_url,
            ws_url,
            wrapped_native,
        } = &self.chain;
        Chain::new(name, rpc_url, ws_url, wrapped_native).wrap_err("failed to parse chain info")
    }

    /// Configured tokens keyed by upper-case symbol.
    pub fn tokens(&self, chain: &Chain) -> HashMap<String, Token> {
        self.tokens
            .iter()
            .map(|(symbol, TokenConfig { address, decimals })| {
                let symbol = symbol.to_ascii_uppercase();
                let token = Token::new(chain.chain_id(), *address, *decimals, &symbol);
                (symbol, token)
            })
            .collect()
    }

    /// Resolves a symbol, with the chain's native symbol mapping to the native currency.
    pub fn currency(&self, chain: &Chain, symbol: &str) -> eyre::Result<Currency> {
        let native = chain.native();
        if symbol.eq_ignore_ascii_case(native.symbol()) {
            return Ok(native);
        }
        self.tokens(chain)
            .remove(&symbol.to_ascii_uppercase())
            .map(Currency::Token)
            .ok_or_else(|| eyre!("token {symbol} not found in config"))
    }

    pub fn venues(&self, chain: &Chain) -> eyre::Result<Vec<Venue>> {
        let tokens = self.tokens(chain);
        let resolve = |symbol: &str| -> eyre::Result<Token> {
            tokens
                .get(&symbol.to_ascii_uppercase())
                .cloned()
                .ok_or_eyre("venue base not found in tokens")
                .wrap_err_with(|| format!("unknown token {symbol}"))
        };
        let resolve_all = |symbols: &[String]| -> eyre::Result<Vec<Token>> {
            symbols.iter().map(|s| resolve(s)).collect()
        };
        let resolve_map = |bases: &HashMap<String, Vec<String>>| {
            bases
                .iter()
                .map(|(symbol, symbols)| Ok((resolve(symbol)?.address, resolve_all(symbols)?)))
                .collect::<eyre::Result<HashMap<Address, Vec<Token>>>>()
        };

        self.venues
            .iter()
            .map(|venue| {
                Ok(Venue {
                    id: VenueId::from(venue.id.as_str()),
                    router: venue.router,
                    factory: venue.factory,
                    common_bases: resolve_all(&venue.common_bases)?,
                    additional_bases: resolve_map(&venue.additional_bases)?,
                    custom_bases: resolve_map(&venue.custom_bases)?,
                })
            })
            .collect::<eyre::Result<Vec<_>>>()
            .wrap_err("failed to parse venue configs")
    }

    pub fn routing_settings(&self, single_hop_only: bool) -> RoutingSettings {
        RoutingSettings {
            better_trade_threshold: Percent::from_bps(self.routing.better_trade_threshold_bps),
            max_hops: self.routing.max_hops,
            single_hop_only,
            min_trade_margin: self.routing.min_trade_margin,
        }
    }

    pub fn submission_settings(&self, deadline: Duration) -> SubmissionSettings {
        SubmissionSettings {
            gas_margin_bps: self.submission.gas_margin_bps,
            approval_gas: self.submission.approval_gas,
            ttl: self.submission.ttl,
            deadline,
            allow_fee_on_transfer: self.submission.allow_fee_on_transfer,
        }
    }

    pub fn fee_oracle(&self) -> FeeOracle {
        FeeOracle::new(self.fees.blocks_ahead, self.fees.window)
    }

    pub fn validator(&self) -> Validator {
        let contracts = self
            .venues
            .iter()
            .flat_map(|venue| [venue.router, venue.factory]);
        Validator::new(
            self.blacklist.iter().copied().chain(contracts),
            self.submission.approval_gas,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
chain:
  name: mainnet
  rpc_url: http://localhost:8545
  ws_url: ws://localhost:8546
  wrapped_native: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
tokens:
  weth:
    address: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
    decimals: 18
  usdc:
    address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
    decimals: 6
  dai:
    address: "0x6B175474E89094C44Da98b954EedeAC495271d0F"
    decimals: 18
venues:
  - id: uniswap
    router: "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"
    factory: "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"
    common_bases: [weth, usdc]
    custom_bases:
      dai: [usdc]
routing:
  better_trade_threshold_bps: 100
submission:
  ttl: 90s
relay_url: ws://localhost:9000
"#;

    fn config() -> Config {
        Figment::from(Yaml::string(YAML)).extract().unwrap()
    }

    #[test]
    fn parses_config_with_defaults() {
        let config = config();
        assert_eq!(config.fees.blocks_ahead, 3);
        assert_eq!(config.tips, TipSettings::default());
        assert_eq!(config.routing.max_hops, MAX_HOPS);
        assert_eq!(config.submission.ttl, Duration::from_secs(90));
        assert_eq!(config.submission.gas_margin_bps, 1_000);

        let settings = config.routing_settings(true);
        assert_eq!(settings.better_trade_threshold, Percent::from_bps(100));
        assert!(settings.single_hop_only);
    }

    #[test]
    fn resolves_venue_bases_and_currencies() {
        let config = config();
        let chain = config.chain().unwrap();
        let venues = config.venues(&chain).unwrap();
        assert_eq!(venues.len(), 1);

        let venue = &venues[0];
        let symbols: Vec<_> = venue.common_bases.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["WETH", "USDC"]);
        let dai = config.tokens(&chain)["DAI"].address;
        assert_eq!(venue.custom_bases[&dai][0].symbol, "USDC");

        assert!(config.currency(&chain, "eth").unwrap().is_native());
        assert_eq!(config.currency(&chain, "usdc").unwrap().decimals(), 6);
        assert!(config.currency(&chain, "nope").is_err());
    }

    #[test]
    fn unknown_base_symbol_is_an_error() {
        let mut config = config();
        config.venues[0].common_bases.push("wbtc".into());
        let chain = config.chain().unwrap();
        assert!(config.venues(&chain).is_err());
    }

    #[test]
    fn routers_are_never_valid_recipients() {
        let config = config();
        let router = config.venues[0].router.to_string();
        assert!(config.validator().check_recipient(&router, None).is_err());
    }
}
