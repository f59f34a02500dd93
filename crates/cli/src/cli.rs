use std::{path::PathBuf, time::Duration};

use alloy::{
    consensus::BlockHeader as _,
    eips::BlockNumberOrTag,
    primitives::B256,
    providers::{Provider as _, ProviderBuilder},
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, OptionExt as _, WrapErr as _};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use veilswap_core::{
    collector::{self, AccountWatch, tx_fee_fields},
    config::Config,
    fees::BlockFeeSample,
    preferences::{self, JsonFileStore, PreferenceStore as _},
    relay::{self, RelayTransport as _},
};

#[derive(Parser)]
#[command(name = "veilswap", about)]
pub(crate) struct Cli {
    /// Config file, overridden by VEILSWAP_ env vars
    #[arg(long, short, default_value = "veilswap.yaml", global = true)]
    pub(crate) config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct TipsArgs {
    /// Store this tip setting
    #[arg(long)]
    set: Option<u8>,
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct CheckRecipientArgs {
    address: String,
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct CancelArgs {
    /// Hash of the submitted swap
    hash: B256,

    /// How long to wait for the relay to confirm the cancellation
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    wait: Duration,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the base fee envelope and priority fee of the latest block
    Fees,

    /// Show or change the stored bribe tip setting
    Tips(TipsArgs),

    /// Check whether an address may receive a swap
    CheckRecipient(CheckRecipientArgs),

    /// Follow new blocks and log fee data and balances
    Watch,

    /// Ask the relay to drop a submitted swap
    Cancel(CancelArgs),
}

impl Cli {
    pub(crate) async fn run(
        self,
        config: Config,
        shutdown_token: CancellationToken,
    ) -> eyre::Result<()> {
        let chain = config.chain()?;
        info!(chain = %chain, "🔗 Initialized chain info from config");

        match self.command {
            Commands::Fees => fees(&config).await,
            Commands::Tips(args) => tips(&config, args),
            Commands::CheckRecipient(args) => {
                match config.validator().check_recipient(&args.address, None) {
                    Ok(address) => info!(%address, "Recipient is valid"),
                    Err(e) => warn!(address = %args.address, reason = %e, "Recipient rejected"),
                }
                Ok(())
            }
            Commands::Watch => watch(&config, shutdown_token).await,
            Commands::Cancel(args) => cancel(&config, args, shutdown_token).await,
        }
    }
}

async fn fees(config: &Config) -> eyre::Result<()> {
    let chain = config.chain()?;
    let provider = ProviderBuilder::new().connect_http(
        chain
            .rpc_url
            .parse()
            .wrap_err("failed to parse rpc url")?,
    );

    let block = provider
        .get_block_by_number(BlockNumberOrTag::Latest)
        .full()
        .await
        .wrap_err("failed to fetch latest block")?
        .ok_or_eyre("node returned no latest block")?;

    let mut oracle = config.fee_oracle();
    oracle.observe(&BlockFeeSample {
        number: block.header.number(),
        base_fee: block.header.base_fee_per_gas().map(u128::from),
        last_tx: block
            .transactions
            .as_transactions()
            .and_then(|txs| txs.last())
            .map(tx_fee_fields),
    });

    match oracle.base_fee() {
        Some(envelope) => info!(
            block.number = block.header.number(),
            current = %envelope.current,
            min = %envelope.min,
            max = %envelope.max,
            blocks_ahead = envelope.blocks_ahead,
            "Base fee envelope"
        ),
        None => warn!(block.number = block.header.number(), "Block has no base fee"),
    }
    match oracle.priority_fee() {
        Some(priority_fee) => info!(%priority_fee, "Priority fee sample"),
        None => warn!("No priority fee sample in latest block"),
    }
    Ok(())
}

fn tips(config: &Config, args: TipsArgs) -> eyre::Result<()> {
    let store = JsonFileStore::new(&config.preferences_path);
    let mut preferences = preferences::load_reconciled(&store, &config.tips)?;

    if let Some(setting) = args.set {
        preferences.set_tip_setting(&config.tips, setting)?;
        store.save(&preferences)?;
        info!(
            setting,
            margin = preferences.tip_margin,
            path = %store.path().display(),
            "Stored tip setting"
        );
    }

    let current = preferences.tip_setting(&config.tips);
    for setting in config.tips.settings() {
        let margin = config.tips.setting_to_value(setting).unwrap_or_default();
        info!(setting, margin, current = setting == current, "Tip setting");
    }
    Ok(())
}

async fn watch(config: &Config, shutdown_token: CancellationToken) -> eyre::Result<()> {
    let chain = config.chain()?;
    let account = config.account.map(|account| AccountWatch {
        account,
        tokens: config.tokens(&chain).values().map(|token| token.address).collect(),
        spenders: config.venues.iter().map(|venue| venue.router).collect(),
    });

    let mut collector = collector::Builder {
        ws_url: chain.ws_url.clone(),
        account,
        shutdown_token: shutdown_token.child_token(),
    }
    .build();
    let mut snapshot_rx = collector.snapshot_rx();
    let mut oracle = config.fee_oracle();

    loop {
        select! {
            biased;

            () = shutdown_token.cancelled() => {
                break collector.shutdown().await;
            }

            res = &mut collector => {
                break res;
            }

            res = snapshot_rx.changed() => {
                res.wrap_err("collector dropped its snapshot channel")?;
                let Some(snapshot) = snapshot_rx.borrow_and_update().clone() else {
                    continue;
                };
                if !oracle.observe(&snapshot.block) {
                    continue;
                }
                info!(
                    block.number = snapshot.block.number,
                    max_base_fee = ?oracle.gas_price_to_beat().map(|fee| fee.to_string()),
                    priority_fee = ?oracle.priority_fee().map(|fee| fee.to_string()),
                    "New block"
                );
                if let Some(balances) = &snapshot.balances {
                    info!(native = %balances.native, tokens = balances.tokens.len(), "Balances");
                }
            }
        }
    }
}

async fn cancel(
    config: &Config,
    args: CancelArgs,
    shutdown_token: CancellationToken,
) -> eyre::Result<()> {
    let mut relay = relay::Builder {
        url: config.relay_url.clone(),
        shutdown_token: shutdown_token.child_token(),
    }
    .build();
    let sender = relay.sender();
    let mut status_rx = sender.subscribe_status();

    sender.emit_transaction_cancellation(args.hash).await?;
    info!(tx.hash = %args.hash, "Requested cancellation");

    let wait_for_status = async {
        loop {
            match status_rx.recv().await {
                Ok(status) if status.hash == args.hash => break Some(status),
                Ok(_) => continue,
                Err(_) => break None,
            }
        }
    };
    select! {
        () = shutdown_token.cancelled() => {}
        status = tokio::time::timeout(args.wait, wait_for_status) => match status {
            Ok(Some(status)) => {
                info!(status = ?status.status, reason = ?status.reason, "Relay status");
            }
            Ok(None) => warn!("Relay connection closed before a status arrived"),
            Err(_) => warn!(wait = ?args.wait, "No status from relay"),
        },
    }

    relay.shutdown().await
}
