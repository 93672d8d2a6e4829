use {
    crate::{CancelToken, ChainError, ChainRole, ConfirmationSource, PollConfig, TxSubmitter},
    async_trait::async_trait,
    futures::stream::Stream,
    renvm_types::{Binary, ChainTransaction, DestinationParams, GatewayIdentifier, Hash256},
    serde::{Deserialize, Serialize},
    std::{pin::Pin, sync::Arc},
};

/// Stream of deposits observed at a gateway identifier.
///
/// The stream may yield the same transaction more than once (e.g. after a
/// reorg or a reconnect). Dropping it stops the watch.
pub type DepositStream = Pin<Box<dyn Stream<Item = Result<InputDeposit, ChainError>> + Send>>;

/// A deposit as reported by the source chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeposit {
    pub transaction: ChainTransaction,
    pub amount: u128,
}

/// What a source chain needs to derive where deposits should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInputs {
    pub asset: String,
    /// Public key of the shard that will custody the deposits.
    pub gpubkey: Binary,
    pub ghash: Hash256,
    pub nonce: Hash256,
}

/// A signed instruction for the destination chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPayload {
    pub asset: String,
    pub selector: String,
    pub destination: DestinationParams,
    pub amount: u128,
    pub phash: Hash256,
    pub nhash: Hash256,
    pub sighash: Hash256,
    pub signature: Binary,
}

/// How to recognize an output that may already exist on the destination.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputReference {
    /// A mint, identified by the signature hash it consumed.
    SigHash(Hash256),
    /// A release the network broadcast itself.
    Release { txid: Binary, txindex: u32 },
}

/// Options handed to every submitter/waiter a chain creates.
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    pub poll: PollConfig,
    pub cancel: CancelToken,
}

/// Base capability every chain integration offers.
///
/// The remaining capabilities are optional; an integration advertises them
/// by overriding the corresponding `as_*` accessor.
#[async_trait]
pub trait Chain: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `asset` originates on this chain (as opposed to being a
    /// wrapped representation).
    fn is_native(&self, asset: &str) -> bool;

    /// Turn a destination address into the bytes committed to by the
    /// gateway hash.
    fn address_to_bytes(&self, address: &str) -> Result<Vec<u8>, ChainError> {
        Ok(address.as_bytes().to_vec())
    }

    async fn confirmation_count(&self, tx: &ChainTransaction) -> Result<u64, ChainError>;

    fn as_input(&self) -> Option<&dyn InputChain> {
        None
    }

    fn as_output(&self) -> Option<&dyn OutputChain> {
        None
    }

    fn as_contract(&self) -> Option<&dyn ContractChain> {
        None
    }

    fn input(&self) -> Result<&dyn InputChain, ChainError> {
        self.as_input()
            .ok_or_else(|| ChainError::unsupported_role(self.name(), ChainRole::Input))
    }

    fn output(&self) -> Result<&dyn OutputChain, ChainError> {
        self.as_output()
            .ok_or_else(|| ChainError::unsupported_role(self.name(), ChainRole::Output))
    }

    fn contract(&self) -> Result<&dyn ContractChain, ChainError> {
        self.as_contract()
            .ok_or_else(|| ChainError::unsupported_role(self.name(), ChainRole::Contract))
    }
}

/// A chain that can receive deposits.
#[async_trait]
pub trait InputChain: Send + Sync {
    /// Deterministic and free of side effects: equal inputs always give an
    /// equal identifier.
    fn derive_gateway_identifier(&self, inputs: &GatewayInputs) -> Result<GatewayIdentifier, ChainError>;

    async fn watch_for_deposits(
        &self,
        asset: &str,
        identifier: &GatewayIdentifier,
    ) -> Result<DepositStream, ChainError>;
}

/// A chain that can settle outputs.
#[async_trait]
pub trait OutputChain: Send + Sync {
    /// Look for an output that has already been submitted, so a resumed
    /// transfer never settles twice.
    async fn find_existing(
        &self,
        reference: &OutputReference,
    ) -> Result<Option<ChainTransaction>, ChainError>;

    /// Prepare a submitter for `payload`. Nothing is broadcast until
    /// [`TxSubmitter::submit`] is called.
    fn submit(
        &self,
        payload: OutputPayload,
        options: WaitOptions,
    ) -> Result<Box<dyn TxSubmitter>, ChainError>;
}

/// A chain that can deliver outputs through a contract call.
pub trait ContractChain: Send + Sync {
    /// Encode the contract call so its hash can be committed to as `phash`.
    fn encode_payload(&self, destination: &DestinationParams) -> Result<Binary, ChainError>;
}

/// Polling confirmations straight off a registered chain.
#[async_trait]
impl ConfirmationSource for Arc<dyn Chain> {
    async fn confirmation_count(&self, tx: &ChainTransaction) -> Result<u64, ChainError> {
        self.as_ref().confirmation_count(tx).await
    }
}
