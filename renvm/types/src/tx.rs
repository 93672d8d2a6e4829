use {
    crate::{Codec, CodecResult, Hash256, HashExt, Ty, TypedValue, pack},
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
};

/// Transaction format version understood by the network.
pub const TX_VERSION: &str = "1";

/// A transaction submitted to the network: a selector plus a typed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenVmTx {
    pub hash: Hash256,
    pub version: String,
    pub selector: String,
    pub input_ty: Ty,
    pub input: TypedValue,
}

impl RenVmTx {
    pub fn new<S>(selector: S, input_ty: Ty, input: TypedValue) -> CodecResult<Self>
    where
        S: Into<String>,
    {
        let selector = selector.into();
        let hash = Self::derive_hash(TX_VERSION, &selector, &input_ty, &input)?;

        Ok(Self {
            hash,
            version: TX_VERSION.to_string(),
            selector,
            input_ty,
            input,
        })
    }

    /// The hash is a pure function of the transaction's content, so the
    /// same deposit always produces the same hash. This is what makes it
    /// safe to ask the network about a transaction before submitting it.
    pub fn derive_hash(
        version: &str,
        selector: &str,
        input_ty: &Ty,
        input: &TypedValue,
    ) -> CodecResult<Hash256> {
        let mut preimage = pack(&Ty::Str, &version.into())?;
        preimage.extend(pack(&Ty::Str, &selector.into())?);
        preimage.extend(pack(input_ty, input)?);

        Ok(preimage.sha256())
    }

    pub fn to_wire(&self, codec: &Codec) -> CodecResult<Value> {
        Ok(json!({
            "hash": self.hash.to_string(),
            "version": self.version,
            "selector": self.selector,
            "in": {
                "t": self.input_ty.descriptor(),
                "v": codec.marshal(&self.input_ty, &self.input)?,
            },
        }))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirming,
    Executing,
    Done,
    Reverted,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Done | TxStatus::Reverted)
    }
}

/// Response to a transaction status query.
///
/// The output is kept in wire form; the caller decodes it against the
/// schema it expects.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTxOutcome {
    pub status: TxStatus,
    pub output: Option<Value>,
}

// ----------------------------------- tests -----------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> (Ty, TypedValue) {
        (
            Ty::record([("txid", Ty::Bytes), ("txindex", Ty::U32)]),
            TypedValue::record([
                ("txid", TypedValue::bytes(vec![1u8, 2, 3])),
                ("txindex", TypedValue::U32(0)),
            ]),
        )
    }

    #[test]
    fn hash_is_deterministic() {
        let (ty, value) = input();
        let a = RenVmTx::new("BTC/toEthereum", ty.clone(), value.clone()).unwrap();
        let b = RenVmTx::new("BTC/toEthereum", ty.clone(), value.clone()).unwrap();
        let c = RenVmTx::new("BTC/toSolana", ty, value).unwrap();

        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
    }

    #[test]
    fn wire_form() {
        let (ty, value) = input();
        let tx = RenVmTx::new("BTC/toEthereum", ty, value).unwrap();
        let wire = tx.to_wire(&Codec::default()).unwrap();

        assert_eq!(wire["hash"], tx.hash.to_string());
        assert_eq!(wire["version"], TX_VERSION);
        assert_eq!(wire["in"]["t"], json!({ "struct": [{ "txid": "b" }, { "txindex": "u32" }] }));
        assert_eq!(wire["in"]["v"], json!({ "txid": "AQID", "txindex": 0 }));
    }

    #[test]
    fn status_names() {
        assert_eq!(serde_json::to_value(TxStatus::Done).unwrap(), "done");
        assert!(TxStatus::Reverted.is_terminal());
        assert!(!TxStatus::Executing.is_terminal());
    }
}
