use std::{pin::Pin, sync::Arc};

use color_eyre::eyre::{self, WrapErr as _, eyre};
use tokio::{select, sync::watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use super::{Quote, QuoteRequest, Quoter};
use crate::{
    collector::ChainSnapshot,
    pricing::{PairSource, Pricer},
};

pub struct Builder<P, S> {
    pub quoter: Quoter<P, S>,
    pub snapshot_rx: watch::Receiver<Option<Arc<ChainSnapshot>>>,
    pub request_rx: watch::Receiver<Option<QuoteRequest>>,
    pub shutdown_token: CancellationToken,
}

impl<P, S> Builder<P, S>
where
    P: Pricer + Send + 'static,
    S: PairSource + Send + 'static,
{
    pub fn build(self) -> Handle {
        let Self {
            quoter,
            snapshot_rx,
            request_rx,
            shutdown_token,
        } = self;

        let (quote_tx, quote_rx) = watch::channel(None);
        let worker = Worker {
            quoter,
            snapshot_rx,
            request_rx,
            quote_tx,
            shutdown_token: shutdown_token.clone(),
        };
        let worker_handle = tokio::spawn(worker.run());

        Handle {
            shutdown_token,
            worker_handle: Some(worker_handle),
            quote_rx,
        }
    }
}

pub struct Handle {
    shutdown_token: CancellationToken,
    worker_handle: Option<tokio::task::JoinHandle<eyre::Result<()>>>,
    quote_rx: watch::Receiver<Option<Arc<Quote>>>,
}

impl Handle {
    /// Latest quote. Older quotes are overwritten, never queued.
    pub fn quote_rx(&self) -> watch::Receiver<Option<Arc<Quote>>> {
        self.quote_rx.clone()
    }

    pub async fn shutdown(&mut self) -> eyre::Result<()> {
        self.shutdown_token.cancel();
        let Some(worker_handle) = self.worker_handle.take() else {
            return Ok(());
        };
        match worker_handle.await {
            Ok(res) => res,
            Err(e) => {
                error!(%e, "Quoter failed");
                Err(e).wrap_err("quoter task panicked")
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
        use futures::future::FutureExt as _;

        let Some(task) = self.worker_handle.as_mut() else {
            return std::task::Poll::Ready(Err(eyre!("quoter handle polled after shutdown")));
        };

        task.poll_unpin(cx).map(|result| match result {
            Ok(worker_res) => match worker_res {
                Ok(()) => Ok(()),
                Err(e) => Err(e).wrap_err("quoter task returned with err"),
            },
            Err(e) => Err(e).wrap_err("quoter task panicked"),
        })
    }
}

struct Worker<P, S> {
    quoter: Quoter<P, S>,
    snapshot_rx: watch::Receiver<Option<Arc<ChainSnapshot>>>,
    request_rx: watch::Receiver<Option<QuoteRequest>>,
    quote_tx: watch::Sender<Option<Arc<Quote>>>,
    shutdown_token: CancellationToken,
}

impl<P: Pricer, S: PairSource> Worker<P, S> {
    #[instrument(name = "quoter", skip(self))]
    async fn run(mut self) -> eyre::Result<()> {
        loop {
            self.recompute();

            select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    info!("Quoter received shutdown signal");
                    break Ok(());
                }

                res = self.snapshot_rx.changed() => {
                    if res.is_err() {
                        break Err(eyre!("chain snapshot channel closed"));
                    }
                }

                res = self.request_rx.changed() => {
                    if res.is_err() {
                        info!("Request channel closed");
                        break Ok(());
                    }
                }
            }
        }
    }

    fn recompute(&mut self) {
        let snapshot = self.snapshot_rx.borrow_and_update().clone();
        let request = self.request_rx.borrow_and_update().clone();
        let (Some(snapshot), Some(request)) = (snapshot, request) else {
            return;
        };

        let quote = self.quoter.quote(&snapshot, &request);
        self.quote_tx.send_if_modified(|current| {
            let changed = current.as_ref().is_none_or(|current| !Arc::ptr_eq(current, &quote));
            if changed {
                *current = Some(quote);
            }
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use num_bigint::BigUint;

    use super::*;
    use crate::{
        amount::CurrencyAmount,
        bribe::{BribeEstimator, TipSettings},
        currency::Currency,
        fees::{BlockFeeSample, FeeOracle},
        preferences::Preferences,
        routing::{RouteSearch, RoutingSettings},
        testing::{FakePairSource, FakePricer, pair, venue},
        trade::{
            TradeType,
            tests::{eth, token, weth},
        },
        validation::{ValidationError, Validator},
    };

    #[tokio::test]
    async fn publishes_latest_quote_and_stops_on_shutdown() {
        let (a, b) = (token(0x01, "A"), token(0x02, "B"));
        let search = RouteSearch::new(
            FakePricer::default(),
            FakePairSource::new(vec![pair("uniswap", &a, &b, 1_000_000, 2_000_000, 0xa1)]),
            weth(),
            RoutingSettings::default(),
        );
        let quoter = Quoter::new(
            search,
            vec![venue("uniswap")],
            FeeOracle::new(1, 1),
            BribeEstimator::new(TipSettings::default(), eth()),
            Validator::new([], 50_000),
        );

        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (request_tx, request_rx) = watch::channel(None);
        let shutdown_token = CancellationToken::new();
        let mut handle = Builder {
            quoter,
            snapshot_rx,
            request_rx,
            shutdown_token,
        }
        .build();
        let mut quote_rx = handle.quote_rx();

        request_tx.send_replace(Some(QuoteRequest {
            input: Some(Currency::Token(a.clone())),
            output: Some(Currency::Token(b)),
            amount: Some(CurrencyAmount::from_raw(Currency::Token(a), 1_000)),
            trade_type: TradeType::ExactInput,
            recipient: None,
            preferences: Preferences::default(),
            pending_approval: None,
        }));
        snapshot_tx.send_replace(Some(Arc::new(ChainSnapshot {
            block: BlockFeeSample {
                number: 7,
                base_fee: Some(10),
                last_tx: None,
            },
            balances: None,
            allowances: HashMap::new(),
        })));

        let quote = tokio::time::timeout(
            Duration::from_secs(5),
            quote_rx.wait_for(|quote| quote.as_ref().is_some_and(|q| q.block == Some(7))),
        )
        .await
        .expect("quote published")
        .unwrap()
        .clone()
        .unwrap();

        let trade = quote.trade.as_ref().unwrap();
        assert_eq!(trade.output_amount().raw_unsigned(), BigUint::from(2_000u32));
        assert_eq!(quote.validation, Err(ValidationError::NoWallet));

        handle.shutdown().await.unwrap();
    }
}
