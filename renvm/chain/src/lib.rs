mod cache;
mod cancel;
mod chain;
mod error;
mod registry;
mod tx;

pub use {cache::*, cancel::*, chain::*, error::*, registry::*, tx::*};
