//! Two-phase cross-chain settlement.
//!
//! Phase 1 marks the intent executed on the source-chain registry, phase 2 settles the delta on
//! the destination vault. The two ledgers finalise independently and there is no rollback: a
//! phase-2 failure after phase 1 leaves the registry ahead of the vault until an operator runs a
//! settle-only replay.
//!
//! Duplicate suppression is delegated to the registry, which reverts on an intent id it has
//! already seen. Nothing is persisted locally.

pub mod evm;

use alloy_primitives::{B256, I256};
use async_trait::async_trait;
use stableflow_types::{ExecutionOutcome, IntentId, RebalanceIntent};
use tracing::{error, info};

use crate::errors::{ChainWriteError, SettlementError};

pub use self::evm::{EvmExecutionRegistry, EvmSettlementVault};

/// A finalised chain write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Source-chain registry of executed intents.
#[async_trait]
pub trait ExecutionRegistry: Send + Sync {
    /// Submit `markExecuted` and wait for finalisation.
    async fn mark_executed(
        &self,
        intent_id: IntentId,
        pool_id: B256,
        imbalance_bps: I256,
    ) -> Result<WriteReceipt, ChainWriteError>;

    /// Whether `err` means the registry already holds this intent id.
    fn is_duplicate_execution(&self, err: &ChainWriteError) -> bool;
}

/// Destination-chain vault.
#[async_trait]
pub trait SettlementVault: Send + Sync {
    /// Submit `settleRebalance` and wait for finalisation.
    async fn settle_rebalance(
        &self,
        intent_id: IntentId,
        pool_id: B256,
        delta_amount: I256,
    ) -> Result<WriteReceipt, ChainWriteError>;
}

pub struct SettlementOrchestrator<R, V> {
    registry: R,
    vault: V,
    unit_scale: I256,
}

impl<R: ExecutionRegistry, V: SettlementVault> SettlementOrchestrator<R, V> {
    pub fn new(registry: R, vault: V, unit_scale: I256) -> Self {
        Self {
            registry,
            vault,
            unit_scale,
        }
    }

    /// Placeholder amount: `imbalance_bps * unit_scale`. Not derived from pool liquidity.
    pub fn settlement_amount(&self, imbalance_bps: I256) -> Result<I256, SettlementError> {
        imbalance_bps
            .checked_mul(self.unit_scale)
            .ok_or(SettlementError::AmountOverflow)
    }

    /// Run both phases for an intent the gate accepted.
    pub async fn execute(
        &self,
        intent_id: IntentId,
        intent: &RebalanceIntent,
    ) -> Result<ExecutionOutcome, SettlementError> {
        // Computed up front so an overflow never leaves phase 1 dangling.
        let delta = self.settlement_amount(intent.imbalance_bps)?;

        let marked = match self
            .registry
            .mark_executed(intent_id, intent.pool_id, intent.imbalance_bps)
            .await
        {
            Ok(receipt) => receipt,
            Err(err) if self.registry.is_duplicate_execution(&err) => {
                info!("intent already executed, skipping settlement");
                return Ok(ExecutionOutcome::AlreadyExecuted);
            }
            Err(err) if err.is_indeterminate() => {
                error!(
                    tx = ?err.tx_hash(),
                    error = %err,
                    "registry write not confirmed; run a settle-only replay if it lands"
                );
                return Err(SettlementError::RegistryUnconfirmed {
                    intent_id,
                    tx_hash: err.tx_hash(),
                    source: err,
                });
            }
            Err(err) => return Err(SettlementError::Registry(err)),
        };
        info!(tx = %marked.tx_hash, block = ?marked.block_number, "execution registry finalized");

        let settled = self
            .vault
            .settle_rebalance(intent_id, intent.pool_id, delta)
            .await
            .map_err(|source| {
                error!(
                    registry_tx = %marked.tx_hash,
                    error = %source,
                    "vault settlement failed after registry write; settle-only replay required"
                );
                SettlementError::PartialSettlement {
                    intent_id,
                    registry_tx: marked.tx_hash,
                    source,
                }
            })?;
        info!(tx = %settled.tx_hash, %delta, "vault settlement finalized");

        Ok(ExecutionOutcome::Settled {
            registry_tx: Some(marked.tx_hash),
            vault_tx: settled.tx_hash,
        })
    }

    /// Phase 2 only. For closing a partial settlement after the registry already has the id.
    pub async fn settle_only(
        &self,
        intent_id: IntentId,
        intent: &RebalanceIntent,
    ) -> Result<ExecutionOutcome, SettlementError> {
        let delta = self.settlement_amount(intent.imbalance_bps)?;
        let settled = self
            .vault
            .settle_rebalance(intent_id, intent.pool_id, delta)
            .await
            .map_err(SettlementError::Vault)?;
        info!(tx = %settled.tx_hash, %delta, "vault settlement finalized (settle-only)");

        Ok(ExecutionOutcome::Settled {
            registry_tx: None,
            vault_tx: settled.tx_hash,
        })
    }
}
