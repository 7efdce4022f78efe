//! Shared types for the StableFlow rebalance executor.
//!
//! Kept free of any RPC client so the same types can be used by the executor, by offline
//! tooling and by tests.

pub mod intent;
pub mod outcome;
pub mod policy;

pub use intent::{derive_intent_id, IntentId, RebalanceIntent};
pub use outcome::{ExecutionOutcome, SkipReason};
pub use policy::{
    ExecutionMode, ExecutorIdentity, PolicyDecodeError, PolicyRecords, PolicySnapshot,
    ProtocolStatus,
};
