#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use {
    crate::{
        Gateway, GatewayConfig, GatewayError, GatewayEvent, MemoryTransferStore, TransferRecord,
        TransferStore,
        transfer::{GatewayContext, TransferTask},
    },
    chrono::Utc,
    futures::StreamExt,
    renvm_chain::{CancelToken, Chain, ChainRegistry, GatewayInputs, InputDeposit},
    renvm_types::{
        Binary, Codec, Deposit, DestinationParams, Direction, FeeEstimate, GatewayIdentifier,
        GatewayParams, RenVmClient, Transfer, TxRef, ghash, phash, shash,
    },
    std::{collections::HashSet, sync::Arc},
    tokio::sync::mpsc,
    tokio_stream::wrappers::UnboundedReceiverStream,
    tracing::{error, info, warn},
};

/// Opens gateways and runs the transfers of every deposit made to them.
pub struct GatewayEngine {
    network: Arc<dyn RenVmClient>,
    chains: ChainRegistry,
    config: GatewayConfig,
    store: Arc<dyn TransferStore>,
    codec: Codec,
}

impl GatewayEngine {
    /// An engine that only remembers transfers for as long as it lives.
    pub fn new(network: Arc<dyn RenVmClient>, chains: ChainRegistry, config: GatewayConfig) -> Self {
        Self::with_store(network, chains, config, Arc::new(MemoryTransferStore::new()))
    }

    pub fn with_store(
        network: Arc<dyn RenVmClient>,
        chains: ChainRegistry,
        config: GatewayConfig,
        store: Arc<dyn TransferStore>,
    ) -> Self {
        let codec = Codec::new(config.codec_max_depth);

        Self {
            network,
            chains,
            config,
            store,
            codec,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    fn chain(&self, name: &str) -> Result<Arc<dyn Chain>, GatewayError> {
        self.chains
            .get(name)
            .ok_or_else(|| GatewayError::UnknownChain(name.to_string()))
    }

    fn direction(
        &self,
        asset: &str,
        source: &dyn Chain,
        destination: &dyn Chain,
    ) -> Result<Direction, GatewayError> {
        Direction::infer(source.is_native(asset), destination.is_native(asset)).ok_or_else(|| {
            GatewayError::AmbiguousDirection {
                asset: asset.to_string(),
                from: source.name().to_string(),
                to: destination.name().to_string(),
            }
        })
    }

    /// Fees the network currently charges for depositing `asset` on its home
    /// chain.
    pub async fn estimate_fees(&self, asset: &str) -> Result<FeeEstimate, GatewayError> {
        let state = self.network.query_asset_state(asset).await?;

        Ok(state.fee_estimate(Direction::LockAndMint))
    }

    /// Fees the network currently charges for moving `asset` from `from` to
    /// `to`.
    pub async fn estimate_transfer_fees(
        &self,
        asset: &str,
        from: &str,
        to: &str,
    ) -> Result<FeeEstimate, GatewayError> {
        let source = self.chain(from)?;
        let destination = self.chain(to)?;
        let direction = self.direction(asset, source.as_ref(), destination.as_ref())?;
        let state = self.network.query_asset_state(asset).await?;

        Ok(state.fee_estimate(direction))
    }

    /// Derive the gateway for `params` and start watching it.
    ///
    /// Transfers recorded for the same gateway are replayed onto the event
    /// stream first, and those that hadn't finished are resumed.
    pub async fn open(&self, params: GatewayParams) -> Result<Gateway, GatewayError> {
        let source = self.chain(&params.from)?;
        let destination = self.chain(&params.to)?;

        let input = source.input()?;
        destination.output()?;

        let direction = self.direction(&params.asset, source.as_ref(), destination.as_ref())?;
        let state = self.network.query_asset_state(&params.asset).await?;
        let fees = state.fee_estimate(direction);

        let selector = direction.selector(&params.asset, &params.from, &params.to);
        let payload = match &params.destination {
            DestinationParams::Address { .. } => Binary::empty(),
            DestinationParams::ContractCall { .. } => {
                destination.contract()?.encode_payload(&params.destination)?
            },
        };
        let phash = phash(&payload);
        let to_bytes = destination.address_to_bytes(params.destination.to())?;
        let ghash = ghash(&phash, &shash(&selector), &to_bytes, &params.nonce);

        let identifier = input.derive_gateway_identifier(&GatewayInputs {
            asset: params.asset.clone(),
            gpubkey: state.gpubkey.clone(),
            ghash,
            nonce: params.nonce,
        })?;

        info!(
            asset = %params.asset,
            from = %params.from,
            to = %params.to,
            %direction,
            %ghash,
            %identifier,
            "Opened gateway",
        );

        let records = self.store.load(&ghash).await?;

        let (events, receiver) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();

        let ctx = Arc::new(GatewayContext {
            network: self.network.clone(),
            source,
            destination,
            store: self.store.clone(),
            config: self.config.clone(),
            codec: self.codec,
            params: params.clone(),
            direction,
            selector,
            fees: fees.clone(),
            gpubkey: state.gpubkey,
            payload,
            phash,
            ghash,
            events,
            cancel: cancel.clone(),
        });

        let mut seen = HashSet::new();
        for record in records {
            seen.insert(record.reference());

            ctx.emit(GatewayEvent::Deposit(record.deposit.clone()));
            ctx.emit(GatewayEvent::Transfer(record.transfer.clone()));

            if !record.transfer.is_terminal() {
                info!(
                    %ghash,
                    deposit = %record.reference(),
                    state = %record.transfer.state,
                    "Resuming transfer",
                );

                TransferTask::new(ctx.clone(), record).spawn();
            }
        }

        tokio::spawn(watch(ctx, identifier.clone(), seen));

        #[cfg(feature = "metrics")]
        gauge!(crate::metrics::GATEWAYS_OPEN).increment(1.0);

        Ok(Gateway {
            identifier,
            params,
            direction,
            fees,
            ghash,
            events: UnboundedReceiverStream::new(receiver),
            cancel,
        })
    }
}

/// Keep a deposit watch alive until the gateway is closed, starting a
/// transfer for every deposit not seen before.
async fn watch(ctx: Arc<GatewayContext>, identifier: GatewayIdentifier, mut seen: HashSet<TxRef>) {
    let input = match ctx.source.input() {
        Ok(input) => input,
        Err(err) => {
            error!(ghash = %ctx.ghash, error = %err, "Can't watch for deposits");
            return;
        },
    };

    let mut backoff = ctx.config.watch_backoff();

    loop {
        let opened = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return,
            opened = input.watch_for_deposits(&ctx.params.asset, &identifier) => opened,
        };

        match opened {
            Ok(mut deposits) => {
                backoff.reset();

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = ctx.cancel.cancelled() => return,
                        next = deposits.next() => next,
                    };

                    match next {
                        Some(Ok(deposit)) => on_deposit(&ctx, &mut seen, deposit).await,
                        Some(Err(err)) if err.is_transient() => {
                            warn!(ghash = %ctx.ghash, error = %err, "Deposit watch interrupted");
                            break;
                        },
                        Some(Err(err)) => {
                            error!(ghash = %ctx.ghash, error = %err, "Deposit watch failed; giving up");
                            return;
                        },
                        None => {
                            warn!(ghash = %ctx.ghash, "Deposit watch ended");
                            break;
                        },
                    }
                }
            },
            Err(err) if err.is_transient() => {
                warn!(ghash = %ctx.ghash, error = %err, "Failed to start deposit watch");
            },
            Err(err) => {
                error!(ghash = %ctx.ghash, error = %err, "Failed to start deposit watch; giving up");
                return;
            },
        }

        #[cfg(feature = "metrics")]
        counter!(crate::metrics::WATCH_RECONNECTS).increment(1);

        let delay = backoff
            .next_delay()
            .unwrap_or(ctx.config.polling.retry_max);

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {},
        }
    }
}

async fn on_deposit(ctx: &Arc<GatewayContext>, seen: &mut HashSet<TxRef>, deposit: InputDeposit) {
    let reference = deposit.transaction.reference();
    if !seen.insert(reference.clone()) {
        return;
    }

    info!(
        ghash = %ctx.ghash,
        deposit = %reference,
        amount = %deposit.amount,
        "Detected deposit",
    );

    #[cfg(feature = "metrics")]
    counter!(crate::metrics::DEPOSITS_DETECTED).increment(1);

    let record = TransferRecord {
        ghash: ctx.ghash,
        transfer: Transfer::new(deposit.transaction.clone()),
        deposit: Deposit {
            transaction: deposit.transaction,
            amount: deposit.amount,
            detected_at: Utc::now(),
        },
    };

    if let Err(err) = ctx.store.save(&record).await {
        error!(ghash = %ctx.ghash, deposit = %reference, error = %err, "Failed to persist deposit");
    }

    ctx.emit(GatewayEvent::Deposit(record.deposit.clone()));
    ctx.emit(GatewayEvent::Transfer(record.transfer.clone()));

    TransferTask::new(ctx.clone(), record).spawn();
}
