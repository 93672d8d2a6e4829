mod config;
mod engine;
mod error;
mod event;
mod gateway;
#[cfg(feature = "metrics")]
pub mod metrics;
mod retry;
mod store;
mod transfer;

pub use {config::*, engine::*, error::*, event::*, gateway::*, store::*};
