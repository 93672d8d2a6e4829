use crate::{Binary, CodecResult, Hash256, Ty, TypedValue, u256_from_u128};

/// Everything the network needs to verify a deposit and sign its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyProof {
    pub txid: Binary,
    pub txindex: u32,
    pub amount: u128,
    pub payload: Binary,
    pub phash: Hash256,
    pub to: String,
    pub nonce: Hash256,
    pub nhash: Hash256,
    pub gpubkey: Binary,
    pub ghash: Hash256,
}

impl CustodyProof {
    pub fn ty() -> Ty {
        Ty::record([
            ("txid", Ty::Bytes),
            ("txindex", Ty::U32),
            ("amount", Ty::U256),
            ("payload", Ty::Bytes),
            ("phash", Ty::Bytes32),
            ("to", Ty::Str),
            ("nonce", Ty::Bytes32),
            ("nhash", Ty::Bytes32),
            ("gpubkey", Ty::Bytes),
            ("ghash", Ty::Bytes32),
        ])
    }

    pub fn to_typed(&self) -> TypedValue {
        TypedValue::record([
            ("txid", TypedValue::Bytes(self.txid.clone())),
            ("txindex", TypedValue::U32(self.txindex)),
            ("amount", TypedValue::U256(u256_from_u128(self.amount))),
            ("payload", TypedValue::Bytes(self.payload.clone())),
            ("phash", self.phash.into()),
            ("to", self.to.as_str().into()),
            ("nonce", self.nonce.into()),
            ("nhash", self.nhash.into()),
            ("gpubkey", TypedValue::Bytes(self.gpubkey.clone())),
            ("ghash", self.ghash.into()),
        ])
    }

    pub fn from_typed(value: &TypedValue) -> CodecResult<Self> {
        Ok(Self {
            txid: value.field("txid")?.as_bytes("$.txid")?.clone(),
            txindex: value.field("txindex")?.as_u32("$.txindex")?,
            amount: value.field("amount")?.as_u128("$.amount")?,
            payload: value.field("payload")?.as_bytes("$.payload")?.clone(),
            phash: value.field("phash")?.as_hash("$.phash")?,
            to: value.field("to")?.as_str("$.to")?.to_string(),
            nonce: value.field("nonce")?.as_hash("$.nonce")?,
            nhash: value.field("nhash")?.as_hash("$.nhash")?,
            gpubkey: value.field("gpubkey")?.as_bytes("$.gpubkey")?.clone(),
            ghash: value.field("ghash")?.as_hash("$.ghash")?,
        })
    }
}

/// What the network returns once it has processed a custody proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOutput {
    pub hash: Hash256,
    pub amount: u128,
    pub sighash: Hash256,
    pub sig: Binary,
    /// For releases, the transaction the network broadcast on the
    /// destination chain. Empty otherwise.
    pub txid: Binary,
    pub txindex: u32,
    /// Empty unless the transaction reverted.
    pub revert: String,
}

impl NetworkOutput {
    pub fn ty() -> Ty {
        Ty::record([
            ("hash", Ty::Bytes32),
            ("amount", Ty::U256),
            ("sighash", Ty::Bytes32),
            ("sig", Ty::Bytes),
            ("txid", Ty::Bytes),
            ("txindex", Ty::U32),
            ("revert", Ty::Str),
        ])
    }

    pub fn to_typed(&self) -> TypedValue {
        TypedValue::record([
            ("hash", self.hash.into()),
            ("amount", TypedValue::U256(u256_from_u128(self.amount))),
            ("sighash", self.sighash.into()),
            ("sig", TypedValue::Bytes(self.sig.clone())),
            ("txid", TypedValue::Bytes(self.txid.clone())),
            ("txindex", TypedValue::U32(self.txindex)),
            ("revert", self.revert.as_str().into()),
        ])
    }

    pub fn from_typed(value: &TypedValue) -> CodecResult<Self> {
        Ok(Self {
            hash: value.field("hash")?.as_hash("$.hash")?,
            amount: value.field("amount")?.as_u128("$.amount")?,
            sighash: value.field("sighash")?.as_hash("$.sighash")?,
            sig: value.field("sig")?.as_bytes("$.sig")?.clone(),
            txid: value.field("txid")?.as_bytes("$.txid")?.clone(),
            txindex: value.field("txindex")?.as_u32("$.txindex")?,
            revert: value.field("revert")?.as_str("$.revert")?.to_string(),
        })
    }

    pub fn is_reverted(&self) -> bool {
        !self.revert.is_empty()
    }
}
