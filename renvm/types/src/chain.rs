use {
    crate::Binary,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// A transaction on some chain, as reported by that chain's integration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub chain: String,
    pub txid: Binary,
    pub txindex: u32,
    /// Human readable form (e.g. a hex hash or explorer path). Opaque to the
    /// engine.
    pub display: String,
}

impl ChainTransaction {
    pub fn new<C, T, D>(chain: C, txid: T, txindex: u32, display: D) -> Self
    where
        C: Into<String>,
        T: Into<Binary>,
        D: Into<String>,
    {
        Self {
            chain: chain.into(),
            txid: txid.into(),
            txindex,
            display: display.into(),
        }
    }

    pub fn reference(&self) -> TxRef {
        TxRef {
            chain: self.chain.clone(),
            txid: self.txid.clone(),
            txindex: self.txindex,
        }
    }
}

impl fmt::Display for ChainTransaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.display)
    }
}

/// Identity of a deposit: the source transaction and output index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxRef {
    pub chain: String,
    pub txid: Binary,
    pub txindex: u32,
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chain, self.txid, self.txindex)
    }
}

/// Where a depositor sends funds.
///
/// UTXO chains derive a fresh address; account chains usually reuse an
/// existing account and tell deposits apart by memo or payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIdentifier {
    Address(String),
    Account(String),
}

impl GatewayIdentifier {
    pub fn as_str(&self) -> &str {
        match self {
            GatewayIdentifier::Address(s) | GatewayIdentifier::Account(s) => s,
        }
    }
}

impl fmt::Display for GatewayIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
