mod backoff;
mod binary;
mod chain;
mod client;
mod codec;
mod error;
mod fees;
mod gateway;
mod hash;
mod pack;
mod proof;
mod transfer;
mod ty;
mod tx;
mod value;

pub use {
    backoff::*, binary::*, chain::*, client::*, codec::*, error::*, fees::*, gateway::*, hash::*,
    pack::*, proof::*, transfer::*, ty::*, tx::*, value::*,
};

// Re-exports
pub use {bigdecimal::num_bigint::BigUint, bnum::types::U256};
