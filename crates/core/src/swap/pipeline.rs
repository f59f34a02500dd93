//! One submission attempt: estimate, sign approval and swap, hand off to the relay.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy::{
    consensus::TxEip1559,
    primitives::{Address, B256, TxKind, U256},
};
use num_bigint::BigUint;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::{
    call::{self, PendingCall, SwapParameters},
    gas::{self, EstimatedCall},
    signer::{self, Signer as _, SignedTx, SignerKind},
    wallet::WalletRpc,
};
use crate::{
    amount::Percent,
    approval::ApprovalState,
    error::SwapError,
    quoter::Quote,
    relay::{RelayRequest, RelayStatus, RelayTransport},
    trade::Trade,
    validation::ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Estimating,
    SigningApproval,
    SigningSwap,
    Submitted {
        hash: B256,
    },
    Confirmed {
        hash: B256,
    },
    Rejected {
        hash: B256,
        reason: Option<String>,
    },
    /// Aborted before submission, or reported failed by the relay.
    Failed {
        reason: String,
    },
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Confirmed { .. }
                | SubmissionState::Rejected { .. }
                | SubmissionState::Failed { .. }
        )
    }

    /// Whether `next` may follow `self` within one attempt.
    pub fn can_advance_to(&self, next: &SubmissionState) -> bool {
        use SubmissionState::*;
        match (self, next) {
            (_, Failed { .. }) => !self.is_terminal(),
            (Idle, Estimating) => true,
            (Estimating, SigningApproval | SigningSwap) => true,
            (SigningApproval, SigningSwap) => true,
            (SigningSwap, Submitted { .. }) => true,
            (Submitted { hash }, Confirmed { hash: next } | Rejected { hash: next, .. }) => {
                hash == next
            }
            // a fresh attempt after the previous one finished
            (prev, Estimating) => prev.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSettings {
    pub gas_margin_bps: u64,
    /// Gas limit used for approvals the wallet cannot estimate.
    pub approval_gas: u64,
    /// How long the relay keeps trying.
    pub ttl: Duration,
    /// How long the router accepts the swap.
    pub deadline: Duration,
    pub allow_fee_on_transfer: bool,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            gas_margin_bps: gas::DEFAULT_GAS_MARGIN_BPS,
            approval_gas: 50_000,
            ttl: Duration::from_secs(120),
            deadline: Duration::from_secs(20 * 60),
            allow_fee_on_transfer: false,
        }
    }
}

/// Per-attempt inputs.
#[derive(Debug, Clone)]
pub struct SwapAttempt<'a> {
    pub trade: &'a Trade,
    pub router: Address,
    pub recipient: Address,
    pub slippage: Percent,
    /// Highest base fee reachable within the lookahead; the bribe pays the builder so no
    /// priority fee is set.
    pub max_fee_per_gas: u128,
    /// Nonce of an approval for this token that was already handed off.
    pub pending_approval: Option<u64>,
}

impl<'a> SwapAttempt<'a> {
    /// Attempt for a quote that passed validation. The output goes to the recipient the quote
    /// checked, or back to `wallet` when the quote had none.
    pub fn from_quote(
        quote: &'a Quote,
        wallet: Address,
        slippage: Percent,
    ) -> Result<Self, SwapError> {
        quote.validation?;
        let (Some(trade), Some(router)) = (quote.trade.as_ref(), quote.router) else {
            return Err(SwapError::NoLiquidity);
        };
        let recipient = quote.recipient.unwrap_or(wallet);
        if recipient.is_zero()
            || recipient == router
            || trade.route().addresses().any(|address| address == recipient)
        {
            return Err(SwapError::InvalidRecipient);
        }
        let max_fee_per_gas = quote
            .base_fee
            .as_ref()
            .and_then(|envelope| u128::try_from(&envelope.max).ok())
            .ok_or(SwapError::NotReady(ValidationError::FeeDataUnavailable))?;

        Ok(Self {
            trade,
            router,
            recipient,
            slippage,
            max_fee_per_gas,
            pending_approval: quote.approval.pending_nonce(),
        })
    }
}

/// An approval handed to the relay together with a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedApproval {
    pub hash: B256,
    /// Pass this as the pending approval of the next attempt until the approval is mined.
    pub nonce: u64,
}

/// What was handed to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub hash: B256,
    pub approval: Option<SubmittedApproval>,
    pub request: RelayRequest,
}

pub struct SwapSubmitter<'a, W, R> {
    wallet: &'a W,
    relay: &'a R,
    signer: SignerKind,
    chain_id: u64,
    from: Address,
    settings: SubmissionSettings,
    state_tx: watch::Sender<SubmissionState>,
}

impl<'a, W: WalletRpc, R: RelayTransport> SwapSubmitter<'a, W, R> {
    /// Probes the wallet for its chain and signing style.
    pub async fn connect(
        wallet: &'a W,
        relay: &'a R,
        from: Address,
        settings: SubmissionSettings,
    ) -> Result<Self, SwapError> {
        let chain_id = wallet
            .chain_id()
            .await
            .map_err(|e| SwapError::SwapFailed(e.to_string()))?;
        let signer = signer::probe(wallet)
            .await
            .map_err(|e| SwapError::from_signing(e, false))?;
        info!(chain.id = chain_id, ?signer, %from, "Connected wallet");

        Ok(Self {
            wallet,
            relay,
            signer,
            chain_id,
            from,
            settings,
            state_tx: watch::Sender::new(SubmissionState::Idle),
        })
    }

    pub fn state(&self) -> SubmissionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SubmissionState> {
        self.state_tx.subscribe()
    }

    pub fn signer(&self) -> SignerKind {
        self.signer
    }

    fn transition(&self, next: SubmissionState) {
        let prev = self.state();
        if !prev.can_advance_to(&next) {
            warn!(?prev, ?next, "Unexpected submission state transition");
        }
        debug!(?prev, ?next, "Submission state");
        self.state_tx.send_replace(next);
    }

    /// Runs one attempt up to the relay hand-off. Nothing is retried.
    #[instrument(skip_all, fields(trade = %attempt.trade))]
    pub async fn submit(&self, attempt: &SwapAttempt<'_>) -> Result<Submission, SwapError> {
        self.transition(SubmissionState::Estimating);
        match self.run(attempt).await {
            Ok(submission) => {
                self.transition(SubmissionState::Submitted {
                    hash: submission.hash,
                });
                info!(tx.hash = %submission.hash, "Swap submitted to relay");
                Ok(submission)
            }
            Err(e) => {
                self.transition(SubmissionState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, attempt: &SwapAttempt<'_>) -> Result<Submission, SwapError> {
        let params = SwapParameters {
            recipient: attempt.recipient,
            slippage: attempt.slippage.clone(),
            deadline: deadline_from_now(self.settings.deadline),
            allow_fee_on_transfer: self.settings.allow_fee_on_transfer,
        };
        let calls = call::swap_calls(attempt.trade, attempt.router, &params)?;

        let approval = self.approval_state(attempt, calls.max_input).await?;

        // until an approval is mined the swap cannot be simulated, so fall back to the quoted gas
        let estimated = if approval != ApprovalState::Approved {
            let call = calls
                .candidates
                .first()
                .cloned()
                .ok_or(SwapError::NoLiquidity)?;
            EstimatedCall {
                call,
                gas_limit: gas::with_margin(
                    attempt.trade.estimated_gas(),
                    self.settings.gas_margin_bps,
                ),
            }
        } else {
            gas::estimate_calls(
                self.wallet,
                self.from,
                &calls.candidates,
                self.settings.gas_margin_bps,
            )
            .await?
        };

        let account_nonce = self
            .wallet
            .transaction_count(self.from)
            .await
            .map_err(|e| SwapError::SwapFailed(e.to_string()))?;

        let signed_approval = if approval.needs_approval() {
            self.transition(SubmissionState::SigningApproval);
            let token = attempt
                .trade
                .input_amount()
                .currency()
                .as_token()
                .map(|token| token.address)
                .ok_or_else(|| SwapError::ApprovalFailed("input is not a token".to_string()))?;
            let signed = self.sign_approval(token, attempt, account_nonce).await?;
            Some((signed, account_nonce))
        } else {
            None
        };

        self.transition(SubmissionState::SigningSwap);
        let swap_nonce = match (&signed_approval, approval.pending_nonce()) {
            // the approval is broadcast first and takes the current nonce
            (Some(_), _) => account_nonce + 1,
            // relayed privately, so the node's pending count does not include it
            (None, Some(approval_nonce)) => account_nonce.max(approval_nonce + 1),
            (None, None) => account_nonce,
        };
        let swap_tx = self.transaction(&estimated.call, estimated.gas_limit, swap_nonce, attempt);
        let signed_swap = match self.signer.sign(self.wallet, self.from, swap_tx).await {
            Ok(signed) => signed,
            Err(e) => {
                if signed_approval.is_some() {
                    debug!("Discarding signed approval, swap was not signed");
                }
                return Err(SwapError::from_signing(e, false));
            }
        };

        let request = RelayRequest {
            serialized_approve: signed_approval.as_ref().map(|(tx, _)| tx.raw.clone()),
            serialized_swap: signed_swap.raw.clone(),
            swap: calls.summary,
            bribe: calls.bribe,
            router_address: attempt.router,
            ttl: u64::try_from(self.settings.ttl.as_millis()).unwrap_or(u64::MAX),
        };
        self.relay
            .emit_transaction_request(signed_swap.hash, request.clone())
            .await
            .map_err(|e| SwapError::SwapFailed(format!("{e:#}")))?;

        Ok(Submission {
            hash: signed_swap.hash,
            approval: signed_approval.map(|(tx, nonce)| SubmittedApproval {
                hash: tx.hash,
                nonce,
            }),
            request,
        })
    }

    async fn approval_state(
        &self,
        attempt: &SwapAttempt<'_>,
        required: U256,
    ) -> Result<ApprovalState, SwapError> {
        let Some(token) = attempt.trade.input_amount().currency().as_token() else {
            return Ok(ApprovalState::Approved);
        };
        let allowance = self
            .wallet
            .allowance(token.address, self.from, attempt.router)
            .await
            .map_err(|e| SwapError::ApprovalFailed(e.to_string()))?;

        let state = ApprovalState::from_allowance(
            Some(&BigUint::from_bytes_be(&allowance.to_be_bytes::<32>())),
            &BigUint::from_bytes_be(&required.to_be_bytes::<32>()),
            attempt.pending_approval,
        );
        debug!(token = %token, %allowance, ?state, "Checked allowance");
        Ok(state)
    }

    async fn sign_approval(
        &self,
        token: Address,
        attempt: &SwapAttempt<'_>,
        nonce: u64,
    ) -> Result<SignedTx, SwapError> {
        let approve = call::approve_call(token, attempt.router);
        let gas_limit = match self.wallet.estimate_gas(&approve.to_request(self.from)).await {
            Ok(gas) => gas::with_margin(gas, self.settings.gas_margin_bps),
            Err(e) => {
                debug!(error = %e, "Approval estimate failed, using configured gas");
                self.settings.approval_gas
            }
        };

        let tx = self.transaction(&approve, gas_limit, nonce, attempt);
        self.signer
            .sign(self.wallet, self.from, tx)
            .await
            .map_err(|e| SwapError::from_signing(e, true))
    }

    fn transaction(
        &self,
        call: &PendingCall,
        gas_limit: u64,
        nonce: u64,
        attempt: &SwapAttempt<'_>,
    ) -> TxEip1559 {
        TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas: attempt.max_fee_per_gas,
            max_priority_fee_per_gas: 0,
            to: TxKind::Call(call.contract),
            value: call.value,
            access_list: Default::default(),
            input: call.calldata.clone(),
        }
    }

    /// Asks the relay to drop a submitted swap.
    pub async fn cancel(&self, hash: B256) -> Result<(), SwapError> {
        self.relay
            .emit_transaction_cancellation(hash)
            .await
            .map_err(|e| SwapError::SwapFailed(format!("{e:#}")))
    }

    /// Follows relay status events for `hash` until a terminal one arrives.
    pub async fn await_outcome(
        &self,
        hash: B256,
        mut status_rx: broadcast::Receiver<crate::relay::TransactionStatus>,
    ) -> SubmissionState {
        loop {
            let status = match status_rx.recv().await {
                Ok(status) => status,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed relay status updates");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    let next = SubmissionState::Failed {
                        reason: "relay connection closed".to_string(),
                    };
                    self.transition(next.clone());
                    return next;
                }
            };
            if status.hash != hash || !status.status.is_terminal() {
                continue;
            }

            let next = match status.status {
                RelayStatus::Confirmed => SubmissionState::Confirmed { hash },
                RelayStatus::Rejected => SubmissionState::Rejected {
                    hash,
                    reason: status.reason,
                },
                RelayStatus::Failed | RelayStatus::Pending => SubmissionState::Failed {
                    reason: status
                        .reason
                        .unwrap_or_else(|| "relay reported failure".to_string()),
                },
            };
            info!(tx.hash = %hash, state = ?next, "Submission finished");
            self.transition(next.clone());
            return next;
        }
    }
}

fn deadline_from_now(window: Duration) -> u64 {
    SystemTime::now()
        .checked_add(window)
        .and_then(|deadline| deadline.duration_since(UNIX_EPOCH).ok())
        .map_or(u64::MAX, |deadline| deadline.as_secs())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::keccak256;

    use super::*;
    use crate::{
        relay::TransactionStatus,
        swap::testing::{FakeRelay, FakeWallet},
        trade::{
            TradeType,
            tests::{make_trade, token},
        },
    };

    fn attempt(trade: &Trade) -> SwapAttempt<'_> {
        SwapAttempt {
            trade,
            router: Address::repeat_byte(0x77),
            recipient: Address::repeat_byte(0x55),
            slippage: Percent::from_bps(50),
            max_fee_per_gas: 40_000_000_000,
            pending_approval: None,
        }
    }

    async fn connect<'a>(
        wallet: &'a FakeWallet,
        relay: &'a FakeRelay,
    ) -> SwapSubmitter<'a, FakeWallet, FakeRelay> {
        SwapSubmitter::connect(wallet, relay, wallet.address(), SubmissionSettings::default())
            .await
            .unwrap()
    }

    fn trade() -> Trade {
        let (a, b) = (token(0x01, "A"), token(0x02, "B"));
        make_trade(&[&a, &b], TradeType::ExactInput, 1_000, 2_000)
    }

    #[test]
    fn state_machine_transitions() {
        let hash = B256::repeat_byte(0x01);
        assert!(SubmissionState::Idle.can_advance_to(&SubmissionState::Estimating));
        assert!(SubmissionState::Estimating.can_advance_to(&SubmissionState::SigningSwap));
        assert!(!SubmissionState::Idle.can_advance_to(&SubmissionState::SigningSwap));
        assert!(
            SubmissionState::Submitted { hash }
                .can_advance_to(&SubmissionState::Confirmed { hash })
        );
        assert!(!SubmissionState::Submitted { hash }.can_advance_to(&SubmissionState::Confirmed {
            hash: B256::repeat_byte(0x02)
        }));
        let failed = SubmissionState::Failed {
            reason: "x".into(),
        };
        assert!(!failed.can_advance_to(&failed.clone()));
        assert!(failed.can_advance_to(&SubmissionState::Estimating));
    }

    #[test]
    fn attempt_requires_validated_quote() {
        let trade = trade();
        let mut quote = Quote {
            block: Some(1),
            base_fee: Some(crate::fees::base_fee_envelope(&BigUint::from(100u32), 1)),
            priority_fee: None,
            bribe: None,
            trade: Some(trade),
            router: Some(Address::repeat_byte(0x77)),
            recipient: None,
            min_trade: None,
            approval: ApprovalState::Pending { nonce: 4 },
            validation: Ok(()),
        };
        let wallet = Address::repeat_byte(0x55);
        let slippage = Percent::from_bps(50);

        let attempt = SwapAttempt::from_quote(&quote, wallet, slippage.clone()).unwrap();
        // 100 * 1.125 + 1
        assert_eq!(attempt.max_fee_per_gas, 113);
        assert_eq!(attempt.pending_approval, Some(4));
        assert_eq!(attempt.recipient, wallet);

        quote.validation = Err(ValidationError::InsufficientNativeBalance);
        assert_eq!(
            SwapAttempt::from_quote(&quote, wallet, slippage).unwrap_err(),
            SwapError::InsufficientBalance(crate::error::BalanceKind::Native)
        );
    }

    #[test]
    fn attempt_sends_only_to_checked_recipient() {
        let trade = trade();
        let router = Address::repeat_byte(0x77);
        let pool = trade.route().pairs()[0].address;
        let mut quote = Quote {
            block: Some(1),
            base_fee: Some(crate::fees::base_fee_envelope(&BigUint::from(100u32), 1)),
            priority_fee: None,
            bribe: None,
            trade: Some(trade),
            router: Some(router),
            recipient: Some(Address::repeat_byte(0x66)),
            min_trade: None,
            approval: ApprovalState::Approved,
            validation: Ok(()),
        };
        let wallet = Address::repeat_byte(0x55);
        let slippage = Percent::from_bps(50);

        let attempt = SwapAttempt::from_quote(&quote, wallet, slippage.clone()).unwrap();
        assert_eq!(attempt.recipient, Address::repeat_byte(0x66));

        for recipient in [router, pool, Address::ZERO] {
            quote.recipient = Some(recipient);
            assert_eq!(
                SwapAttempt::from_quote(&quote, wallet, slippage.clone()).unwrap_err(),
                SwapError::InvalidRecipient
            );
        }

        quote.recipient = None;
        assert_eq!(
            SwapAttempt::from_quote(&quote, router, slippage).unwrap_err(),
            SwapError::InvalidRecipient
        );
    }

    #[tokio::test]
    async fn approved_token_submits_swap_only() {
        let wallet = FakeWallet::new();
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;
        assert_eq!(submitter.signer(), SignerKind::EthSignTransaction);

        let trade = trade();
        let submission = submitter.submit(&attempt(&trade)).await.unwrap();

        assert_eq!(submission.approval, None);
        assert_eq!(submission.request.serialized_approve, None);
        assert_eq!(submission.hash, keccak256(&submission.request.serialized_swap));
        assert_eq!(submission.request.ttl, 120_000);
        assert_eq!(submitter.state(), SubmissionState::Submitted { hash: submission.hash });

        let signed = wallet.signed();
        assert_eq!(signed.len(), 1);
        assert_eq!(signed[0].nonce, Some(7));
        // 100k estimate plus 10%
        assert_eq!(signed[0].gas, Some(110_000));
        assert_eq!(signed[0].max_priority_fee_per_gas, Some(0));

        let requests = relay.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, submission.hash);
    }

    #[tokio::test]
    async fn missing_allowance_signs_approval_first() {
        let wallet = FakeWallet::new().with_allowance(U256::from(10));
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;

        let trade = trade();
        let submission = submitter.submit(&attempt(&trade)).await.unwrap();
        assert_eq!(submission.approval.map(|approval| approval.nonce), Some(7));
        assert!(submission.request.serialized_approve.is_some());

        let signed = wallet.signed();
        let nonces: Vec<_> = signed.iter().map(|tx| tx.nonce).collect();
        assert_eq!(nonces, vec![Some(7), Some(8)]);
        // swap gas comes from the quote when it cannot be simulated
        assert_eq!(signed[1].gas, Some(165_000));
        assert_eq!(signed[0].to, Some(TxKind::Call(token(0x01, "A").address)));
    }

    #[tokio::test]
    async fn pending_approval_is_not_signed_twice() {
        // the node sees neither the allowance nor the relayed approval's nonce
        let wallet = FakeWallet::new()
            .with_allowance(U256::ZERO)
            .failing_estimates()
            .reverting_calls("TransferHelper: TRANSFER_FROM_FAILED");
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;

        let trade = trade();
        let attempt = SwapAttempt {
            pending_approval: Some(7),
            ..attempt(&trade)
        };
        let submission = submitter.submit(&attempt).await.unwrap();
        assert_eq!(submission.approval, None);
        assert_eq!(submission.request.serialized_approve, None);

        let signed = wallet.signed();
        assert_eq!(signed.len(), 1);
        assert_eq!(signed[0].nonce, Some(8));
        assert_eq!(signed[0].gas, Some(165_000));
    }

    #[tokio::test]
    async fn mined_pending_approval_keeps_account_nonce() {
        let wallet = FakeWallet::new();
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;

        let trade = trade();
        let attempt = SwapAttempt {
            pending_approval: Some(5),
            ..attempt(&trade)
        };
        submitter.submit(&attempt).await.unwrap();

        let signed = wallet.signed();
        assert_eq!(signed[0].nonce, Some(7));
        assert_eq!(signed[0].gas, Some(110_000));
    }

    #[tokio::test]
    async fn estimation_failure_aborts_before_signing() {
        let wallet = FakeWallet::new()
            .failing_estimates()
            .reverting_calls("UniswapV2Router: INSUFFICIENT_OUTPUT_AMOUNT");
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;

        let trade = trade();
        let err = submitter.submit(&attempt(&trade)).await.unwrap_err();
        assert!(err.to_string().contains("Try increasing your slippage tolerance"));
        assert!(wallet.signed().is_empty());
        assert!(relay.requests.lock().unwrap().is_empty());
        assert!(matches!(submitter.state(), SubmissionState::Failed { .. }));
    }

    #[tokio::test]
    async fn rejected_signature_is_distinct() {
        let wallet = FakeWallet::new().rejecting_signatures();
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;

        let trade = trade();
        assert_eq!(
            submitter.submit(&attempt(&trade)).await,
            Err(SwapError::SigningRejected)
        );
    }

    #[tokio::test]
    async fn metamask_signs_with_eth_sign() {
        let wallet = FakeWallet::new().with_client_version("MetaMask/v11.16.0");
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;
        assert_eq!(submitter.signer(), SignerKind::EthSign);

        let trade = trade();
        let submission = submitter.submit(&attempt(&trade)).await.unwrap();
        // signed locally from the eth_sign signature, the wallet never saw a transaction
        assert!(wallet.signed().is_empty());
        assert_eq!(submission.request.serialized_swap[0], 0x02);
    }

    #[tokio::test]
    async fn relay_status_drives_terminal_state() {
        let wallet = FakeWallet::new();
        let relay = FakeRelay::new();
        let submitter = connect(&wallet, &relay).await;

        let trade = trade();
        let status_rx = relay.subscribe_status();
        let submission = submitter.submit(&attempt(&trade)).await.unwrap();

        let other = B256::repeat_byte(0xff);
        for status in [
            TransactionStatus { hash: other, status: RelayStatus::Confirmed, reason: None },
            TransactionStatus { hash: submission.hash, status: RelayStatus::Pending, reason: None },
            TransactionStatus {
                hash: submission.hash,
                status: RelayStatus::Rejected,
                reason: Some("not included".into()),
            },
        ] {
            relay.status_tx.send(status).unwrap();
        }

        let outcome = submitter.await_outcome(submission.hash, status_rx).await;
        assert_eq!(
            outcome,
            SubmissionState::Rejected {
                hash: submission.hash,
                reason: Some("not included".into())
            }
        );
        assert_eq!(submitter.state(), outcome);

        submitter.cancel(submission.hash).await.unwrap();
        assert_eq!(relay.cancellations.lock().unwrap().as_slice(), &[submission.hash]);
    }

    #[tokio::test]
    async fn relay_failure_is_reported() {
        let wallet = FakeWallet::new();
        let mut relay = FakeRelay::new();
        relay.fail = true;
        let submitter = connect(&wallet, &relay).await;

        let trade = trade();
        assert!(matches!(
            submitter.submit(&attempt(&trade)).await,
            Err(SwapError::SwapFailed(_))
        ));
        assert!(matches!(submitter.state(), SubmissionState::Failed { .. }));
    }
}
