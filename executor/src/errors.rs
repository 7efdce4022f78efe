use std::time::Duration;

use alloy_primitives::B256;
use stableflow_types::{IntentId, PolicyDecodeError};
use thiserror::Error;

/// Missing or malformed startup input. Fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("could not connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
}

/// Errors during policy resolution.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("ENS resolver not found for {name} on chain {chain_id}")]
    ResolverNotFound { name: String, chain_id: u64 },

    #[error(transparent)]
    Decode(#[from] PolicyDecodeError),

    #[error("policy source error: {0}")]
    Source(String),

    #[error("policy lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// A chain write that did not reach finalization.
#[derive(Debug, Clone, Error)]
pub enum ChainWriteError {
    /// Reverted at simulation or on-chain. `reason` is the decoded `Error(string)` when present.
    #[error("transaction reverted: {}", .reason.as_deref().unwrap_or("<no reason>"))]
    Reverted { reason: Option<String> },

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("transaction {tx_hash} dropped before finalization")]
    Dropped { tx_hash: B256 },

    /// Submitted, but the confirmation wait failed. The transaction may still be mined.
    #[error("transaction {tx_hash} submitted but not confirmed: {reason}")]
    Unconfirmed { tx_hash: B256, reason: String },

    /// Submission did not answer in time; it may or may not have been broadcast.
    #[error("chain call timed out after {0:?}")]
    Timeout(Duration),
}

impl ChainWriteError {
    /// Whether the write may still land on chain even though it was not seen to finalize.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Unconfirmed { .. } | Self::Dropped { .. }
        )
    }

    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::Dropped { tx_hash } | Self::Unconfirmed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Errors from the two-phase settlement.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("registry write failed: {0}")]
    Registry(#[source] ChainWriteError),

    /// Registry write outcome unknown. If it lands, the intent needs a settle-only replay.
    #[error("intent {intent_id} registry write not confirmed (tx {}): {source}", .tx_hash.map(|h| h.to_string()).unwrap_or_else(|| "unknown".into()))]
    RegistryUnconfirmed {
        intent_id: IntentId,
        tx_hash: Option<B256>,
        #[source]
        source: ChainWriteError,
    },

    /// Registry recorded the intent but the vault did not settle. Needs a settle-only replay.
    #[error("intent {intent_id} marked executed in {registry_tx} but vault settlement failed: {source}")]
    PartialSettlement {
        intent_id: IntentId,
        registry_tx: B256,
        #[source]
        source: ChainWriteError,
    },

    /// Vault write failed during a settle-only replay (registry untouched by this run).
    #[error("vault write failed: {0}")]
    Vault(#[source] ChainWriteError),

    #[error("settlement amount overflows int256")]
    AmountOverflow,
}

/// Errors from the event source.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("event query failed: {0}")]
    Query(String),

    #[error("live subscription failed: {0}")]
    Subscription(String),

    #[error("event query timed out after {0:?}")]
    Timeout(Duration),
}

/// Per-intent failure. The intent is considered unprocessed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("intent has no block number; cannot derive intent id")]
    Unobserved,

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}
