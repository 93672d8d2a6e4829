mod chain;
mod network;
mod suite;
mod tracing;

pub use {chain::*, network::*, suite::*, tracing::*};
