use {
    async_trait::async_trait,
    renvm_types::{
        AssetState, Binary, Codec, CustodyProof, Direction, Hash256, HashExt, NetworkError,
        NetworkOutput, QueryTxOutcome, RenVmClient, RenVmTx, TxStatus,
    },
    std::{
        collections::{BTreeMap, HashMap},
        sync::{Mutex, MutexGuard, PoisonError},
    },
};

/// What the mock network does with the transactions it's given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Sign every transaction.
    Sign,
    /// Finish every transaction with a revert reason in its output.
    Revert(String),
    /// Report every transaction with the `reverted` status.
    RejectStatus,
    /// Never finish signing.
    Stall,
}

/// An in-memory RenVM network.
///
/// Transactions are reported `pending` for a configurable number of queries
/// and then signed, reverted or left hanging depending on [`Behavior`].
/// Amounts are computed from the asset's fees, like the real network does.
pub struct MockNetwork {
    assets: BTreeMap<String, AssetState>,
    codec: Codec,
    state: Mutex<State>,
}

struct State {
    behavior: Behavior,
    pending_polls: u32,
    txs: HashMap<Hash256, Entry>,
    submissions: usize,
    submit_failures: usize,
    asset_queries: usize,
}

struct Entry {
    tx: RenVmTx,
    polls: u32,
}

impl MockNetwork {
    pub fn new<I>(assets: I) -> Self
    where
        I: IntoIterator<Item = AssetState>,
    {
        Self {
            assets: assets
                .into_iter()
                .map(|state| (state.asset.clone(), state))
                .collect(),
            codec: Codec::default(),
            state: Mutex::new(State {
                behavior: Behavior::Sign,
                pending_polls: 1,
                txs: HashMap::new(),
                submissions: 0,
                submit_failures: 0,
                asset_queries: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        self.state().behavior = behavior;
    }

    pub fn set_pending_polls(&self, polls: u32) {
        self.state().pending_polls = polls;
    }

    /// The next `n` submissions fail with a transient error.
    pub fn fail_submissions(&self, n: usize) {
        self.state().submit_failures = n;
    }

    /// Successful `submit_tx` calls so far.
    pub fn submissions(&self) -> usize {
        self.state().submissions
    }

    pub fn asset_queries(&self) -> usize {
        self.state().asset_queries
    }

    pub fn transactions(&self) -> Vec<RenVmTx> {
        self.state().txs.values().map(|entry| entry.tx.clone()).collect()
    }

    fn asset(&self, asset: &str) -> Result<&AssetState, NetworkError> {
        self.assets.get(asset).ok_or_else(|| NetworkError::Rpc {
            code: -32602,
            message: format!("unknown asset {asset}"),
        })
    }

    fn sign(&self, tx: &RenVmTx) -> Result<NetworkOutput, NetworkError> {
        let proof = CustodyProof::from_typed(&tx.input)?;
        let asset = tx.selector.split('/').next().unwrap_or_default();
        let fees = self.asset(asset)?.fee_estimate(direction_of(&tx.selector));

        let mut sighash = tx.hash.to_vec();
        sighash.extend_from_slice(&fees.estimate_output(proof.amount).to_be_bytes());

        Ok(NetworkOutput {
            hash: tx.hash,
            amount: fees.estimate_output(proof.amount),
            sighash: sighash.keccak256(),
            sig: Binary::from(vec![0x1b; 65]),
            txid: proof.nhash.keccak256().to_vec().into(),
            txindex: 0,
            revert: String::new(),
        })
    }
}

fn direction_of(selector: &str) -> Direction {
    let contract = selector.split('/').nth(1).unwrap_or_default();
    if contract.starts_with("to") {
        Direction::LockAndMint
    } else if contract.contains("To") {
        Direction::BurnAndMint
    } else {
        Direction::BurnAndRelease
    }
}

#[async_trait]
impl RenVmClient for MockNetwork {
    async fn submit_tx(&self, tx: &RenVmTx) -> Result<Hash256, NetworkError> {
        let mut state = self.state();

        if state.submit_failures > 0 {
            state.submit_failures -= 1;
            return Err(NetworkError::Transport("connection reset".to_string()));
        }

        state.submissions += 1;
        state.txs.entry(tx.hash).or_insert_with(|| Entry {
            tx: tx.clone(),
            polls: 0,
        });

        Ok(tx.hash)
    }

    async fn query_tx(&self, hash: Hash256) -> Result<QueryTxOutcome, NetworkError> {
        let mut state = self.state();
        let behavior = state.behavior.clone();
        let pending_polls = state.pending_polls;

        let entry = state
            .txs
            .get_mut(&hash)
            .ok_or(NetworkError::TxNotFound(hash))?;

        entry.polls += 1;
        if entry.polls <= pending_polls || behavior == Behavior::Stall {
            return Ok(QueryTxOutcome {
                status: TxStatus::Pending,
                output: None,
            });
        }

        let mut output = self.sign(&entry.tx)?;
        let status = match behavior {
            Behavior::Revert(reason) => {
                output.revert = reason;
                TxStatus::Done
            },
            Behavior::RejectStatus => TxStatus::Reverted,
            Behavior::Sign | Behavior::Stall => TxStatus::Done,
        };

        Ok(QueryTxOutcome {
            status,
            output: Some(self.codec.marshal(&NetworkOutput::ty(), &output.to_typed())?),
        })
    }

    async fn query_asset_state(&self, asset: &str) -> Result<AssetState, NetworkError> {
        self.state().asset_queries += 1;
        self.asset(asset).cloned()
    }
}

/// Bitcoin as the network knows it: 15 bps to mint, 10 bps to burn, plus
/// flat lock and release fees.
pub fn btc_asset_state() -> AssetState {
    AssetState {
        asset: "BTC".to_string(),
        gpubkey: Binary::from(vec![2u8; 33]),
        minimum_amount: 10_000,
        mint_fee_bps: 15,
        burn_fee_bps: 10,
        lock_fee: 3_000,
        release_fee: 5_000,
    }
}

pub fn zec_asset_state() -> AssetState {
    AssetState {
        asset: "ZEC".to_string(),
        gpubkey: Binary::from(vec![3u8; 33]),
        minimum_amount: 50_000,
        mint_fee_bps: 20,
        burn_fee_bps: 20,
        lock_fee: 1_000,
        release_fee: 1_000,
    }
}
