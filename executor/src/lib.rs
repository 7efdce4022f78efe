//! StableFlow cross-chain executor.
//!
//! Watches `RebalanceIntent` events from the hook, gates each one against the governance policy
//! published as ENS text records, and settles authorised intents in two phases: the source-chain
//! execution registry first, the Arc vault second.

pub mod bindings;
pub mod bounded;
pub mod config;
pub mod context;
pub mod convert;
pub mod ens;
pub mod errors;
pub mod gate;
pub mod ingest;
pub mod pipeline;
pub mod policy;
pub mod settlement;

#[cfg(test)]
mod testing;
