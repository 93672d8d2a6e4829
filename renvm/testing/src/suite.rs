use {
    crate::{MockChain, MockNetwork, btc_asset_state, zec_asset_state},
    renvm_chain::ChainRegistry,
    renvm_gateway::{
        Gateway, GatewayConfig, GatewayEngine, GatewayEvent, MemoryTransferStore, PollingConfig,
        TransferStore,
    },
    renvm_types::{
        DestinationParams, GatewayParams, Transfer, TransferState, TxRef, nonce_from_u64,
    },
    std::{collections::BTreeMap, sync::Arc, time::Duration},
};

pub const BITCOIN: &str = "Bitcoin";
pub const ZCASH: &str = "Zcash";
pub const ETHEREUM: &str = "Ethereum";
pub const SOLANA: &str = "Solana";

/// Recipient used by the scenarios.
pub const RECIPIENT: &str = "0x00000000000000000000000000000000000000ff";

/// How long a scenario may take before it's considered stuck.
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(10);

/// Mock network plus one chain per role, sharing a transfer store.
///
/// Engines are cheap: [`TestSuite::engine`] builds a fresh one over the same
/// mocks and store, which is how a process restart is simulated.
pub struct TestSuite {
    pub network: Arc<MockNetwork>,
    pub bitcoin: MockChain,
    pub zcash: MockChain,
    pub ethereum: MockChain,
    pub solana: MockChain,
    pub store: Arc<dyn TransferStore>,
    pub config: GatewayConfig,
}

impl Default for TestSuite {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSuite {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryTransferStore::new()))
    }

    pub fn with_store(store: Arc<dyn TransferStore>) -> Self {
        let mut config = GatewayConfig {
            polling: PollingConfig::fast(),
            ..Default::default()
        };
        config.confirmations.source.insert("BTC".to_string(), 3);
        config.confirmations.destination.insert(ETHEREUM.to_string(), 2);

        Self {
            network: Arc::new(MockNetwork::new([btc_asset_state(), zec_asset_state()])),
            bitcoin: MockChain::utxo(BITCOIN, "BTC"),
            zcash: MockChain::utxo(ZCASH, "ZEC"),
            ethereum: MockChain::host(ETHEREUM),
            // Can hold wrapped assets but not accept deposits.
            solana: MockChain::host(SOLANA).with_input(false),
            store,
            config,
        }
    }

    pub fn chains(&self) -> ChainRegistry {
        ChainRegistry::new()
            .with(self.bitcoin.clone())
            .with(self.zcash.clone())
            .with(self.ethereum.clone())
            .with(self.solana.clone())
    }

    pub fn engine(&self) -> GatewayEngine {
        GatewayEngine::with_store(
            self.network.clone(),
            self.chains(),
            self.config.clone(),
            self.store.clone(),
        )
    }
}

/// Lock BTC on Bitcoin, mint on Ethereum to [`RECIPIENT`].
pub fn btc_to_ethereum(nonce: u64) -> GatewayParams {
    GatewayParams {
        asset: "BTC".to_string(),
        from: BITCOIN.to_string(),
        to: ETHEREUM.to_string(),
        destination: DestinationParams::Address {
            to: RECIPIENT.to_string(),
        },
        nonce: nonce_from_u64(nonce),
    }
}

/// Burn wrapped BTC on Ethereum, release on Bitcoin.
pub fn ethereum_to_btc(nonce: u64) -> GatewayParams {
    GatewayParams {
        asset: "BTC".to_string(),
        from: ETHEREUM.to_string(),
        to: BITCOIN.to_string(),
        destination: DestinationParams::Address {
            to: "bc1qrecipient".to_string(),
        },
        nonce: nonce_from_u64(nonce),
    }
}

/// Everything a gateway emitted until the awaited transfers finished.
#[derive(Debug, Default)]
pub struct Observed {
    pub events: Vec<GatewayEvent>,
    /// Latest transfer per deposit.
    pub transfers: BTreeMap<TxRef, Transfer>,
}

impl Observed {
    pub fn terminal(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.values().filter(|transfer| transfer.is_terminal())
    }

    /// Every transfer event that reported `state`.
    pub fn count_state(&self, state: TransferState) -> usize {
        self.events
            .iter()
            .filter_map(GatewayEvent::as_transfer)
            .filter(|transfer| transfer.state == state)
            .count()
    }

    pub fn deposits(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, GatewayEvent::Deposit(_)))
            .count()
    }
}

/// Read events until `count` distinct deposits are terminal.
///
/// Panics if that takes longer than [`SCENARIO_TIMEOUT`].
pub async fn run_until_terminal(gateway: &mut Gateway, count: usize) -> Observed {
    let mut observed = Observed::default();

    tokio::time::timeout(SCENARIO_TIMEOUT, async {
        while observed.terminal().count() < count {
            let Some(event) = gateway.next_event().await else {
                break;
            };

            if let Some(transfer) = event.as_transfer() {
                observed
                    .transfers
                    .insert(transfer.input.reference(), transfer.clone());
            }

            observed.events.push(event);
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out; observed so far: {:#?}", observed.transfers));

    observed
}

/// Read whatever events arrive within `window`.
pub async fn drain(gateway: &mut Gateway, window: Duration) -> Vec<GatewayEvent> {
    let mut events = vec![];

    while let Ok(Some(event)) = tokio::time::timeout(window, gateway.next_event()).await {
        events.push(event);
    }

    events
}
