use {
    crate::{AssetState, Hash256, NetworkError, QueryTxOutcome, RenVmTx},
    async_trait::async_trait,
};

/// The network's RPC surface as seen by the gateway engine.
///
/// Implementations must be safe to share across every transfer of every
/// gateway; all three calls are idempotent from the caller's point of view.
#[async_trait]
pub trait RenVmClient: Send + Sync {
    /// Submit a transaction, returning the hash the network accepted it under.
    async fn submit_tx(&self, tx: &RenVmTx) -> Result<Hash256, NetworkError>;

    /// Fails with [`NetworkError::TxNotFound`] if the network has never seen
    /// the hash.
    async fn query_tx(&self, hash: Hash256) -> Result<QueryTxOutcome, NetworkError>;

    async fn query_asset_state(&self, asset: &str) -> Result<AssetState, NetworkError>;
}
