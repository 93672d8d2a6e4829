#[cfg(feature = "metrics")]
use metrics::{counter, histogram};
use {
    crate::{
        GatewayConfig, GatewayEvent, TransferRecord, TransferStore,
        retry::{Classify, Interrupt},
    },
    renvm_chain::{
        CancelToken, Chain, ChainError, ConfirmationSource, ConfirmationWaiter, OutputPayload,
        OutputReference, PollConfig, TxOutcome, TxSubmitter, TxWaiter, WaitOptions,
    },
    renvm_types::{
        Binary, ChainTransaction, Codec, CodecError, CustodyProof, Direction, ErrorCode,
        ExponentialBackoff, FeeEstimate, GatewayParams, Hash256, NetworkError, NetworkOutput,
        RenVmClient, RenVmTx, TransferState, TxStatus, nhash,
    },
    std::{future::Future, sync::Arc, time::Duration},
    tokio::sync::mpsc,
    tracing::{debug, error, info, warn},
};

/// Everything the transfers of one gateway share.
pub(crate) struct GatewayContext {
    pub network: Arc<dyn RenVmClient>,
    pub source: Arc<dyn Chain>,
    pub destination: Arc<dyn Chain>,
    pub store: Arc<dyn TransferStore>,
    pub config: GatewayConfig,
    pub codec: Codec,
    pub params: GatewayParams,
    pub direction: Direction,
    pub selector: String,
    pub fees: FeeEstimate,
    pub gpubkey: Binary,
    pub payload: Binary,
    pub phash: Hash256,
    pub ghash: Hash256,
    pub events: mpsc::UnboundedSender<GatewayEvent>,
    pub cancel: CancelToken,
}

impl GatewayContext {
    pub fn emit(&self, event: GatewayEvent) {
        // The receiver is gone once the gateway is dropped; nothing to do.
        let _ = self.events.send(event);
    }

    fn wait_options(&self, poll: PollConfig) -> WaitOptions {
        WaitOptions {
            poll,
            cancel: self.cancel.child(),
        }
    }
}

/// Drives a single deposit from its current state to `SETTLED` or `FAILED`.
pub(crate) struct TransferTask {
    ctx: Arc<GatewayContext>,
    record: TransferRecord,
    /// Decoded network output, once known.
    output: Option<NetworkOutput>,
    /// Destination submitter carried over to the final confirmation wait.
    submitter: Option<Box<dyn TxSubmitter>>,
}

impl TransferTask {
    pub fn new(ctx: Arc<GatewayContext>, record: TransferRecord) -> Self {
        Self {
            ctx,
            record,
            output: None,
            submitter: None,
        }
    }

    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    pub async fn run(mut self) {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        while !self.record.transfer.is_terminal() {
            let step = match self.record.transfer.state {
                TransferState::Detected => self.confirm_deposit().await,
                TransferState::Confirmed => self.submit_to_network().await,
                TransferState::SubmittedToNetwork => self.await_signature().await,
                TransferState::Signed => self.submit_output().await,
                TransferState::SubmittingOutput => self.await_output().await,
                TransferState::Settled | TransferState::Failed => break,
            };

            match step {
                Ok(()) => {},
                Err(Interrupt::Cancelled) => {
                    debug!(
                        ghash = %self.ctx.ghash,
                        deposit = %self.record.reference(),
                        state = %self.record.transfer.state,
                        "Transfer cancelled",
                    );
                    return;
                },
                Err(Interrupt::Failed { code, message }) => {
                    error!(
                        ghash = %self.ctx.ghash,
                        deposit = %self.record.reference(),
                        state = %self.record.transfer.state,
                        %code,
                        reason = %message,
                        "Transfer failed",
                    );

                    #[cfg(feature = "metrics")]
                    counter!(crate::metrics::TRANSFERS_FAILED, "code" => code.to_string())
                        .increment(1);

                    self.record.transfer.fail(code, message);
                    self.commit().await;
                    return;
                },
            }
        }

        #[cfg(feature = "metrics")]
        if self.record.transfer.state == TransferState::Settled {
            counter!(crate::metrics::TRANSFERS_SETTLED).increment(1);
            histogram!(crate::metrics::TRANSFER_DURATION).record(started.elapsed().as_secs_f64());
        }
    }

    // ----------------------------------- steps -----------------------------------

    async fn confirm_deposit(&mut self) -> Result<(), Interrupt> {
        let amount = self.record.deposit.amount;
        if !self.ctx.fees.meets_minimum(amount) {
            return Err(Interrupt::failed(
                ErrorCode::PermanentNetworkError,
                format!(
                    "deposit of {amount} is below the minimum of {}",
                    self.ctx.fees.minimum_amount
                ),
            ));
        }

        let target = self.ctx.config.source_confirmations(&self.ctx.params.asset);
        let source: Arc<dyn ConfirmationSource> = Arc::new(self.ctx.source.clone());
        let waiter = ConfirmationWaiter::new(
            source,
            self.record.deposit.transaction.clone(),
            self.ctx.wait_options(self.ctx.config.confirmation_poll()),
        );

        let mut progress = waiter.progress();
        let wait = waiter.wait(target);
        tokio::pin!(wait);

        let outcome = loop {
            tokio::select! {
                outcome = &mut wait => break outcome,
                changed = progress.changed() => {
                    if changed.is_err() {
                        break wait.await;
                    }

                    let confirmations = progress.borrow_and_update().confirmations;
                    if confirmations > self.record.transfer.confirmations {
                        self.record.transfer.confirmations = confirmations;
                        self.ctx.emit(GatewayEvent::Transfer(self.record.transfer.clone()));
                    }
                },
            }
        };

        self.settled(outcome)?;
        self.record.transfer.confirmations = progress.borrow().confirmations.max(target);
        self.transition(TransferState::Confirmed).await;

        Ok(())
    }

    async fn submit_to_network(&mut self) -> Result<(), Interrupt> {
        let tx = self.build_tx()?;

        self.record.transfer.custody_proof_hash = Some(self.custody_proof_hash());
        self.record.transfer.network_tx_hash = Some(tx.hash);

        let network = self.ctx.network.as_ref();
        let hash = tx.hash;

        // Never submit a transaction the network already knows about.
        let known = self
            .poll_network(move || async move {
                match network.query_tx(hash).await {
                    Ok(_) => Ok(true),
                    Err(NetworkError::TxNotFound(_)) => Ok(false),
                    Err(err) => Err(err),
                }
            })
            .await?;

        if known {
            info!(
                ghash = %self.ctx.ghash,
                deposit = %self.record.reference(),
                hash = %tx.hash,
                "Network already has the transaction; skipping submission",
            );
        } else {
            let tx = &tx;
            let hash = self
                .with_submit_retries(move || network.submit_tx(tx))
                .await?;

            if hash != tx.hash {
                return Err(Interrupt::failed(
                    ErrorCode::PermanentNetworkError,
                    format!("network accepted the transaction as {hash}, expected {}", tx.hash),
                ));
            }

            info!(
                ghash = %self.ctx.ghash,
                deposit = %self.record.reference(),
                %hash,
                "Submitted custody proof",
            );
        }

        self.transition(TransferState::SubmittedToNetwork).await;

        Ok(())
    }

    async fn await_signature(&mut self) -> Result<(), Interrupt> {
        let output = self.fetch_output().await?;

        self.record.transfer.sighash = Some(output.sighash);
        self.record.transfer.signature = Some(output.sig.clone());
        self.record.transfer.output_amount = Some(output.amount);
        self.output = Some(output);

        self.transition(TransferState::Signed).await;

        Ok(())
    }

    async fn submit_output(&mut self) -> Result<(), Interrupt> {
        let output = match self.output.take() {
            Some(output) => output,
            // Resumed from the store; the network still has it.
            None => self.fetch_output().await?,
        };

        let transaction = match self.ctx.direction {
            Direction::BurnAndRelease => self.locate_release(&output).await?,
            Direction::LockAndMint | Direction::BurnAndMint => {
                let (transaction, submitter) = self.submit_mint(&output).await?;
                self.submitter = submitter;
                transaction
            },
        };

        info!(
            ghash = %self.ctx.ghash,
            deposit = %self.record.reference(),
            output = %transaction,
            "Output transaction located",
        );

        self.record.transfer.output = Some(transaction);
        self.output = Some(output);
        self.transition(TransferState::SubmittingOutput).await;

        Ok(())
    }

    async fn await_output(&mut self) -> Result<(), Interrupt> {
        let target = self.ctx.config.destination_confirmations(&self.ctx.params.to);

        let outcome = match self.submitter.take() {
            Some(submitter) => submitter.wait(target).await,
            // Resumed from the store, or a release broadcast by the network.
            None => {
                let transaction = self.record.transfer.output.clone().ok_or_else(|| {
                    Interrupt::failed(ErrorCode::MissingField, "output transaction was not recorded")
                })?;
                let source: Arc<dyn ConfirmationSource> = Arc::new(self.ctx.destination.clone());

                ConfirmationWaiter::new(
                    source,
                    transaction,
                    self.ctx.wait_options(self.ctx.config.confirmation_poll()),
                )
                .wait(target)
                .await
            },
        };

        let transaction = self.settled(outcome)?;

        self.record.transfer.output = Some(transaction);
        self.transition(TransferState::Settled).await;

        info!(
            ghash = %self.ctx.ghash,
            deposit = %self.record.reference(),
            amount = ?self.record.transfer.output_amount,
            "Transfer settled",
        );

        Ok(())
    }

    // ---------------------------------- helpers ----------------------------------

    fn custody_proof_hash(&self) -> Hash256 {
        let tx = &self.record.deposit.transaction;
        nhash(&self.ctx.params.nonce, &tx.txid, tx.txindex)
    }

    fn build_tx(&self) -> Result<RenVmTx, CodecError> {
        let tx = &self.record.deposit.transaction;
        let proof = CustodyProof {
            txid: tx.txid.clone(),
            txindex: tx.txindex,
            amount: self.record.deposit.amount,
            payload: self.ctx.payload.clone(),
            phash: self.ctx.phash,
            to: self.ctx.params.destination.to().to_string(),
            nonce: self.ctx.params.nonce,
            nhash: self.custody_proof_hash(),
            gpubkey: self.ctx.gpubkey.clone(),
            ghash: self.ctx.ghash,
        };

        RenVmTx::new(&self.ctx.selector, CustodyProof::ty(), proof.to_typed())
    }

    /// Poll the network until the transaction is done, returning its
    /// decoded output.
    async fn fetch_output(&self) -> Result<NetworkOutput, Interrupt> {
        let hash = match self.record.transfer.network_tx_hash {
            Some(hash) => hash,
            None => self.build_tx()?.hash,
        };

        let network = self.ctx.network.as_ref();
        let mut backoff = self.ctx.config.network_poll().backoff();

        loop {
            let outcome = self
                .poll_network(move || async move {
                    match network.query_tx(hash).await {
                        Ok(outcome) => Ok(Some(outcome)),
                        // The network may not have indexed a fresh submission yet.
                        Err(NetworkError::TxNotFound(_)) => Ok(None),
                        Err(err) => Err(err),
                    }
                })
                .await?;

            match outcome {
                Some(outcome) if outcome.status == TxStatus::Done => {
                    let wire = outcome
                        .output
                        .ok_or_else(|| CodecError::missing_field("$.tx", "out"))?;
                    let value = self.ctx.codec.unmarshal(&NetworkOutput::ty(), &wire)?;
                    let output = NetworkOutput::from_typed(&value)?;

                    if output.is_reverted() {
                        return Err(Interrupt::failed(
                            ErrorCode::PermanentNetworkError,
                            format!("network transaction reverted: {}", output.revert),
                        ));
                    }

                    return Ok(output);
                },
                Some(outcome) if outcome.status == TxStatus::Reverted => {
                    let reason = outcome
                        .output
                        .and_then(|wire| self.ctx.codec.unmarshal(&NetworkOutput::ty(), &wire).ok())
                        .and_then(|value| NetworkOutput::from_typed(&value).ok())
                        .map(|output| output.revert)
                        .filter(|revert| !revert.is_empty())
                        .unwrap_or_else(|| "no reason given".to_string());

                    return Err(Interrupt::failed(
                        ErrorCode::PermanentNetworkError,
                        format!("network transaction reverted: {reason}"),
                    ));
                },
                Some(outcome) => {
                    debug!(
                        ghash = %self.ctx.ghash,
                        deposit = %self.record.reference(),
                        status = ?outcome.status,
                        "Waiting for the network",
                    );
                },
                None => {},
            }

            let delay = backoff.next_delay().unwrap_or(self.ctx.config.polling.network_max);
            self.sleep(delay).await?;
        }
    }

    /// Releases are broadcast by the network itself; wait for the chain to
    /// see it.
    async fn locate_release(&self, output: &NetworkOutput) -> Result<ChainTransaction, Interrupt> {
        let reference = OutputReference::Release {
            txid: output.txid.clone(),
            txindex: output.txindex,
        };

        let destination = self.ctx.destination.output()?;
        let mut backoff = self.ctx.config.confirmation_poll().backoff();

        loop {
            match self.cancellable(destination.find_existing(&reference)).await? {
                Ok(Some(transaction)) => return Ok(transaction),
                Ok(None) | Err(ChainError::TxNotFound(_)) => {
                    debug!(
                        ghash = %self.ctx.ghash,
                        deposit = %self.record.reference(),
                        "Release not visible on the destination yet",
                    );
                },
                Err(err) if err.is_transient() => {
                    warn!(error = %err, "Failed to look up release; retrying");
                },
                Err(err) => return Err(err.into()),
            }

            let delay = backoff.next_delay().unwrap_or(self.ctx.config.polling.confirmation_max);
            self.sleep(delay).await?;
        }
    }

    /// Submit the signed output to the destination, unless a previous run
    /// already did.
    async fn submit_mint(
        &self,
        output: &NetworkOutput,
    ) -> Result<(ChainTransaction, Option<Box<dyn TxSubmitter>>), Interrupt> {
        let destination = self.ctx.destination.output()?;
        let reference = &OutputReference::SigHash(output.sighash);

        // Never settle the same signature twice.
        let existing = self
            .poll_chain(move || destination.find_existing(reference))
            .await?;

        if let Some(transaction) = existing {
            info!(
                ghash = %self.ctx.ghash,
                deposit = %self.record.reference(),
                output = %transaction,
                "Output already submitted; skipping",
            );
            return Ok((transaction, None));
        }

        let payload = OutputPayload {
            asset: self.ctx.params.asset.clone(),
            selector: self.ctx.selector.clone(),
            destination: self.ctx.params.destination.clone(),
            amount: output.amount,
            phash: self.ctx.phash,
            nhash: self.custody_proof_hash(),
            sighash: output.sighash,
            signature: output.sig.clone(),
        };

        let submitter = destination.submit(
            payload,
            self.ctx.wait_options(self.ctx.config.confirmation_poll()),
        )?;
        let transaction = {
            let submitter = submitter.as_ref();
            self.with_submit_retries(move || submitter.submit()).await?
        };

        Ok((transaction, Some(submitter)))
    }

    fn settled(&self, outcome: TxOutcome) -> Result<ChainTransaction, Interrupt> {
        match outcome {
            TxOutcome::Settled(transaction) => Ok(transaction),
            TxOutcome::Cancelled => Err(Interrupt::Cancelled),
            TxOutcome::Failed(err) => Err(err.into()),
        }
    }

    /// Advance, persist and announce.
    async fn transition(&mut self, next: TransferState) {
        if self.record.transfer.advance(next) {
            debug!(
                ghash = %self.ctx.ghash,
                deposit = %self.record.reference(),
                state = %next,
                "Transfer advanced",
            );

            self.commit().await;
        }
    }

    async fn commit(&self) {
        if let Err(err) = self.ctx.store.save(&self.record).await {
            error!(
                ghash = %self.ctx.ghash,
                deposit = %self.record.reference(),
                error = %err,
                "Failed to persist transfer",
            );
        }

        self.ctx.emit(GatewayEvent::Transfer(self.record.transfer.clone()));
    }

    async fn cancellable<F>(&self, fut: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(Interrupt::Cancelled),
            output = fut => Ok(output),
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), Interrupt> {
        self.cancellable(tokio::time::sleep(delay)).await
    }

    /// Repeat a query until it succeeds, retrying transient errors forever.
    async fn poll_network<T, F, Fut>(&self, op: F) -> Result<T, Interrupt>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, NetworkError>>,
    {
        self.retry_transient(op, self.ctx.config.network_poll().backoff()).await
    }

    async fn poll_chain<T, F, Fut>(&self, op: F) -> Result<T, Interrupt>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        self.retry_transient(op, self.ctx.config.confirmation_poll().backoff()).await
    }

    /// Run a one-shot submission, retrying transient errors up to the
    /// configured number of attempts.
    async fn with_submit_retries<T, E, F, Fut>(&self, op: F) -> Result<T, Interrupt>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        self.retry_transient(op, self.ctx.config.submit_backoff()).await
    }

    async fn retry_transient<T, E, F, Fut>(
        &self,
        op: F,
        mut backoff: ExponentialBackoff,
    ) -> Result<T, Interrupt>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        loop {
            match self.cancellable(op()).await? {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    let Some(delay) = backoff.next_delay() else {
                        return Err(err.into());
                    };

                    warn!(
                        ghash = %self.ctx.ghash,
                        deposit = %self.record.reference(),
                        error = %err,
                        attempts = backoff.attempts(),
                        "Transient error; retrying",
                    );

                    self.sleep(delay).await?;
                },
                Err(err) => return Err(err.into()),
            }
        }
    }
}
