use {
    crate::{Binary, Hash256, HashExt},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// What the depositor wants to happen on the destination chain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DestinationParams {
    /// Send the output to a plain address.
    Address { to: String },
    /// Call a contract with the output. The chain integration decides how
    /// `method` and `payload` become call data.
    ContractCall {
        to: String,
        method: String,
        payload: Binary,
    },
}

impl DestinationParams {
    pub fn to(&self) -> &str {
        match self {
            DestinationParams::Address { to } | DestinationParams::ContractCall { to, .. } => to,
        }
    }
}

/// Everything that determines a gateway. Two gateways with equal params are
/// the same gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GatewayParams {
    pub asset: String,
    pub from: String,
    pub to: String,
    pub destination: DestinationParams,
    pub nonce: Hash256,
}

/// Nonces are 32 bytes; small integer nonces are right-aligned big-endian.
pub fn nonce_from_u64(nonce: u64) -> Hash256 {
    let mut bytes = [0; 32];
    bytes[24..].copy_from_slice(&nonce.to_be_bytes());
    Hash256::from_inner(bytes)
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Asset is native to the source chain; it's locked there and minted on
    /// the destination.
    LockAndMint,
    /// Asset is native to the destination chain; it's burned on the source
    /// and released on the destination.
    BurnAndRelease,
    /// Neither chain is the asset's home; it's burned on one host chain and
    /// minted on another.
    BurnAndMint,
}

impl Direction {
    /// Returns `None` if both chains claim to be the asset's home.
    pub fn infer(source_is_native: bool, destination_is_native: bool) -> Option<Self> {
        match (source_is_native, destination_is_native) {
            (true, false) => Some(Direction::LockAndMint),
            (false, true) => Some(Direction::BurnAndRelease),
            (false, false) => Some(Direction::BurnAndMint),
            (true, true) => None,
        }
    }

    /// Name of the network contract handling this transfer.
    pub fn selector(self, asset: &str, from: &str, to: &str) -> String {
        match self {
            Direction::LockAndMint => format!("{asset}/to{to}"),
            Direction::BurnAndRelease => format!("{asset}/from{from}"),
            Direction::BurnAndMint => format!("{asset}/from{from}To{to}"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::LockAndMint => f.write_str("lock-and-mint"),
            Direction::BurnAndRelease => f.write_str("burn-and-release"),
            Direction::BurnAndMint => f.write_str("burn-and-mint"),
        }
    }
}

// ---------------------------------- hashes -----------------------------------

pub fn shash(selector: &str) -> Hash256 {
    selector.keccak256()
}

pub fn phash(payload: &[u8]) -> Hash256 {
    payload.keccak256()
}

/// Commits to everything about a gateway except the deposit itself.
pub fn ghash(phash: &Hash256, shash: &Hash256, to: &[u8], nonce: &Hash256) -> Hash256 {
    let mut preimage = Vec::with_capacity(96 + to.len());
    preimage.extend_from_slice(phash.as_ref());
    preimage.extend_from_slice(shash.as_ref());
    preimage.extend_from_slice(to);
    preimage.extend_from_slice(nonce.as_ref());
    preimage.keccak256()
}

/// Unique per deposit: the gateway nonce bound to the deposit's outpoint.
pub fn nhash(nonce: &Hash256, txid: &[u8], txindex: u32) -> Hash256 {
    let mut preimage = Vec::with_capacity(36 + txid.len());
    preimage.extend_from_slice(nonce.as_ref());
    preimage.extend_from_slice(txid);
    preimage.extend_from_slice(&txindex.to_be_bytes());
    preimage.keccak256()
}

// ----------------------------------- tests -----------------------------------
