use std::pin::Pin;

use alloy::primitives::B256;
use color_eyre::eyre::{self, WrapErr as _, eyre};
use futures::{SinkExt as _, StreamExt as _};
use tokio::{
    select,
    sync::{broadcast, mpsc},
};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{RelayEvent, RelayRequest, RelayTransport, TransactionStatus};

/// Cloneable sending side of the relay connection.
#[derive(Debug, Clone)]
pub struct RelaySender {
    outgoing_tx: mpsc::Sender<RelayEvent>,
    status_tx: broadcast::Sender<TransactionStatus>,
}

impl RelaySender {
    pub(super) fn new(
        outgoing_tx: mpsc::Sender<RelayEvent>,
        status_tx: broadcast::Sender<TransactionStatus>,
    ) -> Self {
        Self {
            outgoing_tx,
            status_tx,
        }
    }

    async fn send(&self, event: RelayEvent) -> eyre::Result<()> {
        self.outgoing_tx
            .send(event)
            .await
            .map_err(|_| eyre!("relay connection closed"))
    }
}

impl RelayTransport for RelaySender {
    async fn emit_transaction_request(
        &self,
        hash: B256,
        request: RelayRequest,
    ) -> eyre::Result<()> {
        self.send(RelayEvent::TransactionRequest { hash, request })
            .await
    }

    async fn emit_transaction_cancellation(&self, hash: B256) -> eyre::Result<()> {
        self.send(RelayEvent::TransactionCancelRequest { hash })
            .await
    }

    fn subscribe_status(&self) -> broadcast::Receiver<TransactionStatus> {
        self.status_tx.subscribe()
    }
}

pub struct Handle {
    sender: RelaySender,
    shutdown_token: CancellationToken,
    worker_handle: Option<tokio::task::JoinHandle<eyre::Result<()>>>,
}

impl Handle {
    pub(super) fn new(
        sender: RelaySender,
        shutdown_token: CancellationToken,
        worker_handle: tokio::task::JoinHandle<eyre::Result<()>>,
    ) -> Self {
        Self {
            sender,
            shutdown_token,
            worker_handle: Some(worker_handle),
        }
    }

    pub fn sender(&self) -> RelaySender {
        self.sender.clone()
    }

    pub async fn shutdown(&mut self) -> eyre::Result<()> {
        self.shutdown_token.cancel();
        let Some(worker_handle) = self.worker_handle.take() else {
            return Ok(());
        };
        match worker_handle.await {
            Ok(res) => res,
            Err(e) => {
                error!(%e, "Relay worker failed");
                Err(e).wrap_err("relay task panicked")
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
            return std::task::Poll::Ready(Err(eyre!("relay handle polled after shutdown")));
        };

        task.poll_unpin(cx).map(|result| match result {
            Ok(worker_res) => match worker_res {
                Ok(()) => Ok(()),
                Err(e) => Err(e).wrap_err("relay task returned with err"),
            },
            Err(e) => Err(e).wrap_err("relay task panicked"),
        })
    }
}

pub(super) struct Worker {
    pub(super) url: String,
    pub(super) outgoing_rx: mpsc::Receiver<RelayEvent>,
    pub(super) status_tx: broadcast::Sender<TransactionStatus>,
    pub(super) shutdown_token: CancellationToken,
}

impl Worker {
    #[instrument(name = "relay_worker", skip(self), fields(relay.url = %self.url))]
    pub(super) async fn run(self) -> eyre::Result<()> {
        let Self {
            url,
            mut outgoing_rx,
            status_tx,
            shutdown_token,
        } = self;

        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .wrap_err("failed to connect to relay websocket")?;
        let (mut write, mut read) = socket.split();
        info!("Connected to relay");

        loop {
            select! {
                biased;

                () = shutdown_token.cancelled() => {
                    info!("Relay worker received shutdown signal");
                    if let Err(e) = write.close().await {
                        debug!(error = %e, "Relay socket already closed");
                    }
                    break Ok(());
                }

                Some(event) = outgoing_rx.recv() => {
                    let text = serde_json::to_string(&event)
                        .wrap_err("failed to serialize relay event")?;
                    write
                        .send(Message::text(text))
                        .await
                        .wrap_err("failed to write to relay websocket")?;
                    debug!(event = ?event_name(&event), "Sent relay event");
                }

                msg = read.next() => {
                    let Some(msg) = msg else {
                        break Err(eyre!("relay websocket stream ended"));
                    };
                    match msg.wrap_err("relay websocket stream closed")? {
                        Message::Text(text) => match serde_json::from_str::<RelayEvent>(&text) {
                            Ok(RelayEvent::TransactionStatus(status)) => {
                                debug!(
                                    tx.hash = %status.hash,
                                    status = ?status.status,
                                    "Relay status update"
                                );
                                // no subscribers is fine, nobody is waiting on this hash
                                let _ = status_tx.send(status);
                            }
                            Ok(other) => {
                                warn!(event = ?event_name(&other), "Unexpected event from relay");
                            }
                            Err(e) => warn!(error = %e, "Failed to parse relay message"),
                        },
                        Message::Close(frame) => {
                            break Err(eyre!("relay closed the connection: {frame:?}"));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

fn event_name(event: &RelayEvent) -> &'static str {
    match event {
        RelayEvent::TransactionRequest { .. } => "transaction_request",
        RelayEvent::TransactionCancelRequest { .. } => "transaction_cancel_request",
        RelayEvent::TransactionStatus(_) => "transaction_status",
    }
}
