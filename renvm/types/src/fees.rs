use {
    crate::{Binary, CodecResult, Direction, Ty, TypedValue, u256_from_u128},
    serde::{Deserialize, Serialize},
    serde_with::{DisplayFromStr, serde_as},
};

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// The network's current parameters for one asset.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetState {
    pub asset: String,
    /// Public key of the shard custodying the asset.
    pub gpubkey: Binary,
    #[serde_as(as = "DisplayFromStr")]
    pub minimum_amount: u128,
    pub mint_fee_bps: u16,
    pub burn_fee_bps: u16,
    /// Flat fee paid to the underlying chain's miners when locking.
    #[serde_as(as = "DisplayFromStr")]
    pub lock_fee: u128,
    /// Flat fee paid to the underlying chain's miners when releasing.
    #[serde_as(as = "DisplayFromStr")]
    pub release_fee: u128,
}

impl AssetState {
    /// Wire schema of the per-asset block state.
    pub fn ty() -> Ty {
        Ty::record([
            ("gPubKey", Ty::Bytes),
            ("minimumAmount", Ty::U256),
            ("mintFee", Ty::U16),
            ("burnFee", Ty::U16),
            ("lockFee", Ty::U256),
            ("releaseFee", Ty::U256),
        ])
    }

    pub fn from_typed<A>(asset: A, value: &TypedValue) -> CodecResult<Self>
    where
        A: Into<String>,
    {
        Ok(Self {
            asset: asset.into(),
            gpubkey: value.field("gPubKey")?.as_bytes("$.gPubKey")?.clone(),
            minimum_amount: value.field("minimumAmount")?.as_u128("$.minimumAmount")?,
            mint_fee_bps: clamp_bps(value.field("mintFee")?.as_u32("$.mintFee")?),
            burn_fee_bps: clamp_bps(value.field("burnFee")?.as_u32("$.burnFee")?),
            lock_fee: value.field("lockFee")?.as_u128("$.lockFee")?,
            release_fee: value.field("releaseFee")?.as_u128("$.releaseFee")?,
        })
    }

    pub fn to_typed(&self) -> TypedValue {
        TypedValue::record([
            ("gPubKey", TypedValue::Bytes(self.gpubkey.clone())),
            ("minimumAmount", TypedValue::U256(u256_from_u128(self.minimum_amount))),
            ("mintFee", TypedValue::U16(self.mint_fee_bps)),
            ("burnFee", TypedValue::U16(self.burn_fee_bps)),
            ("lockFee", TypedValue::U256(u256_from_u128(self.lock_fee))),
            ("releaseFee", TypedValue::U256(u256_from_u128(self.release_fee))),
        ])
    }

    pub fn fee_estimate(&self, direction: Direction) -> FeeEstimate {
        let (variable_bps, fixed_fee) = match direction {
            Direction::LockAndMint => (self.mint_fee_bps, self.lock_fee),
            Direction::BurnAndRelease => (self.burn_fee_bps, self.release_fee),
            // No underlying chain is involved, so there's no flat fee.
            Direction::BurnAndMint => (self.mint_fee_bps.saturating_add(self.burn_fee_bps), 0),
        };

        FeeEstimate {
            asset: self.asset.clone(),
            direction,
            minimum_amount: self.minimum_amount,
            variable_bps: clamp_bps(variable_bps as u32),
            fixed_fee,
        }
    }
}

fn clamp_bps(bps: u32) -> u16 {
    bps.min(BPS_DENOMINATOR as u32) as u16
}

/// Fees charged for moving an asset in a given direction.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeeEstimate {
    pub asset: String,
    pub direction: Direction,
    #[serde_as(as = "DisplayFromStr")]
    pub minimum_amount: u128,
    pub variable_bps: u16,
    #[serde_as(as = "DisplayFromStr")]
    pub fixed_fee: u128,
}

impl FeeEstimate {
    /// Net amount received for an input of `amount`, never negative.
    pub fn estimate_output(&self, amount: u128) -> u128 {
        amount
            .saturating_sub(self.fixed_fee)
            .saturating_sub(self.variable_fee(amount))
    }

    /// `floor(amount * bps / 10_000)` without overflowing.
    pub fn variable_fee(&self, amount: u128) -> u128 {
        let bps = self.variable_bps as u128;
        (amount / BPS_DENOMINATOR) * bps + (amount % BPS_DENOMINATOR) * bps / BPS_DENOMINATOR
    }

    pub fn meets_minimum(&self, amount: u128) -> bool {
        amount >= self.minimum_amount
    }
}

// ----------------------------------- tests -----------------------------------
