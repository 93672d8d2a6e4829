use {
    anyhow::anyhow,
    async_trait::async_trait,
    data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE},
    futures::StreamExt,
    renvm_chain::{
        AssetCache, BroadcastSubmitter, Broadcaster, Chain, ChainError, ConfirmationSource,
        ContractChain, DepositStream, GatewayInputs, InputChain, InputDeposit, OutputChain,
        OutputPayload, OutputReference, TxSubmitter, WaitOptions,
    },
    renvm_types::{
        Binary, ChainTransaction, DestinationParams, GatewayIdentifier, Hash256, HashExt, TxRef,
    },
    std::{
        collections::{BTreeSet, HashMap, HashSet},
        sync::{
            Arc, Mutex, PoisonError,
            atomic::{AtomicUsize, Ordering},
        },
    },
    tokio::sync::mpsc,
    tokio_stream::wrappers::UnboundedReceiverStream,
};

/// How addresses on a mock chain are turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFormat {
    /// Any string; its UTF-8 bytes.
    Utf8,
    /// `0x`-prefixed hex.
    Hex,
}

/// An in-memory chain.
///
/// Every transaction it knows about gains one confirmation each time it's
/// queried. Deposits are injected with [`MockChain::deposit`]; outputs are
/// recorded when broadcast and can be inspected afterwards.
#[derive(Clone)]
pub struct MockChain {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    native: BTreeSet<String>,
    input: bool,
    output: bool,
    contract: bool,
    address_format: AddressFormat,
    /// Token address per asset, looked up at most once.
    tokens: AssetCache<String>,
    token_lookups: AtomicUsize,
    broadcasts: AtomicUsize,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    confirmations: HashMap<TxRef, u64>,
    /// Transactions whose confirmation queries fail permanently.
    dropped: HashSet<TxRef>,
    /// Deposits per gateway identifier, in arrival order.
    deposits: HashMap<String, Vec<InputDeposit>>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Result<InputDeposit, ChainError>>>>,
    watches_opened: usize,
    /// Outputs by the signature hash they consumed.
    outputs: HashMap<Hash256, ChainTransaction>,
    /// Transient broadcast failures still to be returned.
    broadcast_failures: usize,
    /// Queries for a release that return nothing before it shows up.
    release_delay: usize,
    release_queries: HashMap<(Binary, u32), usize>,
}

impl MockChain {
    /// A chain offering every role.
    pub fn new<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                native: BTreeSet::new(),
                input: true,
                output: true,
                contract: true,
                address_format: AddressFormat::Utf8,
                tokens: AssetCache::new(),
                token_lookups: AtomicUsize::new(0),
                broadcasts: AtomicUsize::new(0),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// A UTXO-style chain that is home to `asset` and can't call contracts.
    pub fn utxo<N, A>(name: N, asset: A) -> Self
    where
        N: Into<String>,
        A: Into<String>,
    {
        Self::new(name).with_native(asset).with_contract(false)
    }

    /// An account-based chain with hex addresses hosting wrapped assets.
    pub fn host<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        Self::new(name).with_address_format(AddressFormat::Hex)
    }

    // Builder methods only run before the chain is shared.
    fn configure(mut self, f: impl FnOnce(&mut Inner)) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => f(inner),
            None => panic!("mock chain configured after being shared"),
        }
        self
    }

    pub fn with_native<A>(self, asset: A) -> Self
    where
        A: Into<String>,
    {
        let asset = asset.into();
        self.configure(|inner| {
            inner.native.insert(asset);
        })
    }

    pub fn with_input(self, enabled: bool) -> Self {
        self.configure(|inner| inner.input = enabled)
    }

    pub fn with_output(self, enabled: bool) -> Self {
        self.configure(|inner| inner.output = enabled)
    }

    pub fn with_contract(self, enabled: bool) -> Self {
        self.configure(|inner| inner.contract = enabled)
    }

    pub fn with_address_format(self, format: AddressFormat) -> Self {
        self.configure(|inner| inner.address_format = format)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --------------------------------- injection ---------------------------------

    /// The transaction [`MockChain::deposit`] creates for `seed`.
    pub fn transaction(&self, seed: u8) -> ChainTransaction {
        let txid = vec![seed; 32];
        let display = HEXLOWER.encode(&txid);

        ChainTransaction::new(self.inner.name.clone(), txid, 0, display)
    }

    /// Send `amount` to a gateway. Delivered to every open watch of
    /// `identifier`, and replayed to watches opened later.
    pub fn deposit(&self, identifier: &GatewayIdentifier, seed: u8, amount: u128) -> ChainTransaction {
        let transaction = self.transaction(seed);

        self.redeliver(identifier, InputDeposit {
            transaction: transaction.clone(),
            amount,
        });

        transaction
    }

    /// Deliver a deposit again, as a chain does after a reorg.
    pub fn redeliver(&self, identifier: &GatewayIdentifier, deposit: InputDeposit) {
        let mut state = self.state();
        let key = identifier.as_str().to_string();

        state
            .confirmations
            .entry(deposit.transaction.reference())
            .or_insert(0);
        state
            .deposits
            .entry(key.clone())
            .or_default()
            .push(deposit.clone());

        if let Some(watchers) = state.watchers.get_mut(&key) {
            watchers.retain(|watcher| watcher.send(Ok(deposit.clone())).is_ok());
        }
    }

    /// Make every open watch of `identifier` fail with `err`.
    pub fn interrupt_watch(&self, identifier: &GatewayIdentifier, err: ChainError) {
        if let Some(watchers) = self.state().watchers.remove(identifier.as_str()) {
            for watcher in watchers {
                let _ = watcher.send(Err(err.clone()));
            }
        }
    }

    /// Confirmation queries for `tx` fail permanently from now on.
    pub fn drop_transaction(&self, tx: &ChainTransaction) {
        self.state().dropped.insert(tx.reference());
    }

    /// The next `n` broadcasts fail with a transient error.
    pub fn fail_broadcasts(&self, n: usize) {
        self.state().broadcast_failures = n;
    }

    /// Releases only become visible after `n` lookups.
    pub fn delay_releases(&self, n: usize) {
        self.state().release_delay = n;
    }

    /// Pretend an output was already submitted for `sighash`.
    pub fn insert_output(&self, sighash: Hash256, tx: ChainTransaction) {
        let mut state = self.state();
        state.confirmations.entry(tx.reference()).or_insert(0);
        state.outputs.insert(sighash, tx);
    }

    // -------------------------------- inspection ---------------------------------

    pub fn broadcasts(&self) -> usize {
        self.inner.broadcasts.load(Ordering::SeqCst)
    }

    pub fn outputs(&self) -> Vec<ChainTransaction> {
        self.state().outputs.values().cloned().collect()
    }

    pub fn watches_opened(&self) -> usize {
        self.state().watches_opened
    }

    pub fn token_lookups(&self) -> usize {
        self.inner.token_lookups.load(Ordering::SeqCst)
    }

    async fn token_address(&self, asset: &str) -> Result<String, ChainError> {
        let inner = self.inner.as_ref();

        inner
            .tokens
            .get_or_try_insert_with(asset, move || async move {
                inner.token_lookups.fetch_add(1, Ordering::SeqCst);
                let hash = format!("{}/{asset}", inner.name).keccak256();
                Ok::<_, ChainError>(format!("0x{}", HEXLOWER.encode(&hash[..20])))
            })
            .await
    }
}

#[async_trait]
impl Chain for MockChain {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn is_native(&self, asset: &str) -> bool {
        self.inner.native.contains(asset)
    }

    fn address_to_bytes(&self, address: &str) -> Result<Vec<u8>, ChainError> {
        match self.inner.address_format {
            AddressFormat::Utf8 => Ok(address.as_bytes().to_vec()),
            AddressFormat::Hex => {
                let hex = address
                    .strip_prefix("0x")
                    .ok_or_else(|| ChainError::permanent(anyhow!("address `{address}` lacks 0x prefix")))?;

                HEXLOWER_PERMISSIVE
                    .decode(hex.as_bytes())
                    .map_err(ChainError::permanent)
            },
        }
    }

    async fn confirmation_count(&self, tx: &ChainTransaction) -> Result<u64, ChainError> {
        let mut state = self.state();
        let reference = tx.reference();

        if state.dropped.contains(&reference) {
            return Err(ChainError::permanent(anyhow!("transaction {tx} was dropped")));
        }

        match state.confirmations.get_mut(&reference) {
            Some(confirmations) => {
                *confirmations += 1;
                Ok(*confirmations)
            },
            None => Err(ChainError::tx_not_found(tx)),
        }
    }

    fn as_input(&self) -> Option<&dyn InputChain> {
        self.inner.input.then_some(self as &dyn InputChain)
    }

    fn as_output(&self) -> Option<&dyn OutputChain> {
        self.inner.output.then_some(self as &dyn OutputChain)
    }

    fn as_contract(&self) -> Option<&dyn ContractChain> {
        self.inner.contract.then_some(self as &dyn ContractChain)
    }
}

#[async_trait]
impl ConfirmationSource for MockChain {
    async fn confirmation_count(&self, tx: &ChainTransaction) -> Result<u64, ChainError> {
        Chain::confirmation_count(self, tx).await
    }
}

#[async_trait]
impl InputChain for MockChain {
    fn derive_gateway_identifier(&self, inputs: &GatewayInputs) -> Result<GatewayIdentifier, ChainError> {
        let mut preimage = inputs.gpubkey.to_vec();
        preimage.extend_from_slice(inputs.ghash.as_ref());
        let hash = preimage.keccak256();

        let identifier = match self.inner.address_format {
            AddressFormat::Utf8 => GatewayIdentifier::Address(format!(
                "{}1{}",
                self.inner.name.to_lowercase(),
                HEXLOWER.encode(&hash[..20])
            )),
            AddressFormat::Hex => GatewayIdentifier::Account(format!("0x{}", HEXLOWER.encode(&hash[..20]))),
        };

        Ok(identifier)
    }

    async fn watch_for_deposits(
        &self,
        _asset: &str,
        identifier: &GatewayIdentifier,
    ) -> Result<DepositStream, ChainError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state();
        let key = identifier.as_str().to_string();

        for deposit in state.deposits.get(&key).into_iter().flatten() {
            let _ = sender.send(Ok(deposit.clone()));
        }

        state.watchers.entry(key).or_default().push(sender);
        state.watches_opened += 1;

        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}

#[async_trait]
impl OutputChain for MockChain {
    async fn find_existing(
        &self,
        reference: &OutputReference,
    ) -> Result<Option<ChainTransaction>, ChainError> {
        let mut state = self.state();

        match reference {
            OutputReference::SigHash(sighash) => Ok(state.outputs.get(sighash).cloned()),
            OutputReference::Release { txid, txindex } => {
                let delay = state.release_delay;
                let queries = state
                    .release_queries
                    .entry((txid.clone(), *txindex))
                    .or_insert(0);
                *queries += 1;

                if *queries <= delay {
                    return Ok(None);
                }

                let tx = ChainTransaction::new(
                    self.inner.name.clone(),
                    txid.clone(),
                    *txindex,
                    HEXLOWER.encode(txid),
                );
                state.confirmations.entry(tx.reference()).or_insert(0);

                Ok(Some(tx))
            },
        }
    }

    fn submit(
        &self,
        payload: OutputPayload,
        options: WaitOptions,
    ) -> Result<Box<dyn TxSubmitter>, ChainError> {
        Ok(Box::new(BroadcastSubmitter::new(
            self.clone(),
            Arc::new(self.clone()),
            payload,
            options,
        )))
    }
}

#[async_trait]
impl Broadcaster for MockChain {
    async fn broadcast(&self, payload: &OutputPayload) -> Result<ChainTransaction, ChainError> {
        let token = self.token_address(&payload.asset).await?;

        let mut state = self.state();
        if state.broadcast_failures > 0 {
            state.broadcast_failures -= 1;
            return Err(ChainError::transient(anyhow!("node unavailable")));
        }

        self.inner.broadcasts.fetch_add(1, Ordering::SeqCst);

        let mut preimage = token.into_bytes();
        preimage.extend_from_slice(payload.sighash.as_ref());
        let txid = preimage.keccak256();

        let tx = ChainTransaction::new(
            self.inner.name.clone(),
            txid.to_vec(),
            0,
            format!("0x{}", HEXLOWER.encode(txid.as_ref())),
        );

        state.confirmations.insert(tx.reference(), 0);
        state.outputs.insert(payload.sighash, tx.clone());

        Ok(tx)
    }
}

impl ContractChain for MockChain {
    fn encode_payload(&self, destination: &DestinationParams) -> Result<Binary, ChainError> {
        match destination {
            DestinationParams::ContractCall { method, payload, .. } => {
                let mut encoded = method.keccak256()[..4].to_vec();
                encoded.extend_from_slice(payload);
                Ok(encoded.into())
            },
            DestinationParams::Address { .. } => Ok(Binary::empty()),
        }
    }
}
