use std::{collections::HashMap, pin::{Pin, pin}, sync::Arc};

use alloy::{
    consensus::BlockHeader as _,
    eips::BlockNumberOrTag,
    primitives::U256,
    providers::{Provider, ProviderBuilder, WsConnect},
};
use color_eyre::eyre::{self, WrapErr as _, eyre};
use futures::future::{FusedFuture as _, Fuse, FutureExt as _};
use num_bigint::BigUint;
use tokio::{select, sync::watch};
use tokio_stream::{Stream, StreamExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{AccountWatch, ChainSnapshot, tx_fee_fields};
use crate::{fees::BlockFeeSample, swap::call::IERC20, validation::WalletBalances};

pub struct Handle {
    shutdown_token: CancellationToken,
    worker_handle: Option<tokio::task::JoinHandle<eyre::Result<()>>>,
    snapshot_rx: watch::Receiver<Option<Arc<ChainSnapshot>>>,
}

impl Handle {
    pub(super) fn new(
        shutdown_token: CancellationToken,
        worker_handle: tokio::task::JoinHandle<eyre::Result<()>>,
        snapshot_rx: watch::Receiver<Option<Arc<ChainSnapshot>>>,
    ) -> Self {
        Self {
            shutdown_token,
            worker_handle: Some(worker_handle),
            snapshot_rx,
        }
    }

    pub fn snapshot_rx(&self) -> watch::Receiver<Option<Arc<ChainSnapshot>>> {
        self.snapshot_rx.clone()
    }

    pub async fn shutdown(&mut self) -> eyre::Result<()> {
        self.shutdown_token.cancel();
        let Some(worker_handle) = self.worker_handle.take() else {
            return Ok(());
        };
        match worker_handle.await {
            Ok(res) => res,
            Err(e) => {
                error!(%e, "Block collector failed");
                Err(e).wrap_err("collector task panicked")
            }
        }
    }
}

// Awaiting the handle deals with the Worker's result
impl Future for Handle {
    type Output = eyre::Result<()>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let Some(task) = self.worker_handle.as_mut() else {
            return std::task::Poll::Ready(Err(eyre!("collector handle polled after shutdown")));
        };

        task.poll_unpin(cx).map(|result| match result {
            Ok(worker_res) => match worker_res {
                Ok(()) => Ok(()),
                Err(e) => Err(e).wrap_err("collector task returned with err"),
            },
            Err(e) => Err(e).wrap_err("collector task panicked"),
        })
    }
}

pub(super) struct Worker {
    pub(super) ws_url: String,
    pub(super) account: Option<AccountWatch>,
    pub(super) snapshot_tx: watch::Sender<Option<Arc<ChainSnapshot>>>,
    pub(super) shutdown_token: CancellationToken,
}

impl Worker {
    #[instrument(name = "block_collector", skip(self))]
    pub(super) async fn run(self) -> eyre::Result<()> {
        let Self {
            ws_url,
            account,
            snapshot_tx,
            shutdown_token,
        } = self;

        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url))
            .await
            .wrap_err("failed to connect to node websocket")?;
        let headers = provider
            .subscribe_blocks()
            .await
            .wrap_err("failed to subscribe to new headers")?
            .into_stream();
        info!("Subscribed to new headers");

        let provider = &provider;
        let account = account.as_ref();
        follow_headers(
            headers.map(|header| (header.number(), header.base_fee_per_gas())),
            move |number, base_fee| snapshot(provider, number, base_fee, account),
            &snapshot_tx,
            &shutdown_token,
        )
        .await
    }
}

/// Publishes one snapshot per `(number, base_fee)` header. At most one fetch is in
/// flight and a newer header drops it.
async fn follow_headers<H, F, Fut>(
    mut headers: H,
    fetch: F,
    snapshot_tx: &watch::Sender<Option<Arc<ChainSnapshot>>>,
    shutdown_token: &CancellationToken,
) -> eyre::Result<()>
where
    H: Stream<Item = (u64, Option<u64>)> + Unpin,
    F: Fn(u64, Option<u64>) -> Fut,
    Fut: Future<Output = eyre::Result<ChainSnapshot>>,
{
    let mut in_flight = pin!(Fuse::<Fut>::terminated());
    let mut in_flight_number = 0;

    loop {
        select! {
            biased;

            () = shutdown_token.cancelled() => {
                info!("Block collector received shutdown signal");
                break Ok(());
            }

            header = headers.next() => {
                let Some((number, base_fee)) = header else {
                    break Err(eyre!("header subscription ended"));
                };
                if !in_flight.is_terminated() {
                    debug!(block.number = in_flight_number, "Dropping stale block fetch");
                }
                in_flight.set(fetch(number, base_fee).fuse());
                in_flight_number = number;
            }

            res = &mut in_flight, if !in_flight.is_terminated() => match res {
                Ok(snapshot) => {
                    debug!(
                        block.number = in_flight_number,
                        base_fee = ?snapshot.block.base_fee,
                        "Collected block"
                    );
                    snapshot_tx.send_replace(Some(Arc::new(snapshot)));
                }
                Err(e) => {
                    warn!(block.number = in_flight_number, error = %e, "Failed to collect block");
                }
            },
        }
    }
}

async fn snapshot<P: Provider + Clone>(
    provider: &P,
    number: u64,
    base_fee: Option<u64>,
    account: Option<&AccountWatch>,
) -> eyre::Result<ChainSnapshot> {
    let block = provider
        .get_block_by_number(BlockNumberOrTag::Number(number))
        .full()
        .await
        .wrap_err("failed to fetch block")?
        .ok_or_else(|| eyre!("block {number} not found"))?;
    let last_tx = block
        .transactions
        .as_transactions()
        .and_then(|txs| txs.last())
        .map(tx_fee_fields);

    let sample = BlockFeeSample {
        number,
        base_fee: base_fee.map(u128::from),
        last_tx,
    };

    let Some(account) = account else {
        return Ok(ChainSnapshot {
            block: sample,
            balances: None,
            allowances: HashMap::new(),
        });
    };

    let native = provider
        .get_balance(account.account)
        .number(number)
        .await
        .wrap_err("failed to fetch native balance")?;

    let mut tokens = HashMap::new();
    let mut allowances = HashMap::new();
    for &token in &account.tokens {
        let contract = IERC20::new(token, provider.clone());
        let balance: U256 = contract
            .balanceOf(account.account)
            .block(number.into())
            .call()
            .await
            .wrap_err_with(|| format!("failed to fetch balance of token {token}"))?;
        tokens.insert(token, to_biguint(balance));

        for &spender in &account.spenders {
            let allowance: U256 = contract
                .allowance(account.account, spender)
                .block(number.into())
                .call()
                .await
                .wrap_err_with(|| format!("failed to fetch allowance of token {token}"))?;
            allowances.insert((token, spender), to_biguint(allowance));
        }
    }

    Ok(ChainSnapshot {
        block: sample,
        balances: Some(WalletBalances {
            native: to_biguint(native),
            tokens,
        }),
        allowances,
    })
}

fn to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}
