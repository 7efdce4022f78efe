//! EVM bindings for the registry (source chain) and the vault (destination chain).

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, I256};
use async_trait::async_trait;
use ethers::{
    abi::{self, ParamType, Token},
    contract::{ContractCall, ContractError},
    providers::{Middleware, MiddlewareError},
    types::U64,
};
use stableflow_types::IntentId;
use tracing::debug;

use super::{ExecutionRegistry, SettlementVault, WriteReceipt};
use crate::{
    bindings,
    bounded::bounded,
    convert::{from_eth_h256, to_eth_address, to_eth_i256},
    errors::ChainWriteError,
};

/// `bytes4(keccak256("Error(string)"))`.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Revert reason the registry emits for an intent id it has already recorded.
pub const ALREADY_EXECUTED_REASON: &str = "Intent already executed";

/// How long to wait for each write. The deadline bounds submission only.
#[derive(Clone, Copy, Debug)]
pub struct WritePolicy {
    pub confirmations: usize,
    pub call_timeout: Option<Duration>,
}

pub struct EvmExecutionRegistry<M> {
    contract: bindings::ExecutionRegistry<M>,
    policy: WritePolicy,
}

impl<M: Middleware + 'static> EvmExecutionRegistry<M> {
    pub fn new(address: Address, client: Arc<M>, policy: WritePolicy) -> Self {
        Self {
            contract: bindings::ExecutionRegistry::new(to_eth_address(address), client),
            policy,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ExecutionRegistry for EvmExecutionRegistry<M> {
    async fn mark_executed(
        &self,
        intent_id: IntentId,
        pool_id: B256,
        imbalance_bps: I256,
    ) -> Result<WriteReceipt, ChainWriteError> {
        let call =
            self.contract
                .mark_executed(*intent_id.as_bytes(), pool_id.0, to_eth_i256(imbalance_bps));
        submit_and_wait(call, self.policy).await
    }

    fn is_duplicate_execution(&self, err: &ChainWriteError) -> bool {
        is_already_executed(err)
    }
}

pub struct EvmSettlementVault<M> {
    contract: bindings::ArcVault<M>,
    policy: WritePolicy,
}

impl<M: Middleware + 'static> EvmSettlementVault<M> {
    pub fn new(address: Address, client: Arc<M>, policy: WritePolicy) -> Self {
        Self {
            contract: bindings::ArcVault::new(to_eth_address(address), client),
            policy,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> SettlementVault for EvmSettlementVault<M> {
    async fn settle_rebalance(
        &self,
        intent_id: IntentId,
        pool_id: B256,
        delta_amount: I256,
    ) -> Result<WriteReceipt, ChainWriteError> {
        let call =
            self.contract
                .settle_rebalance(*intent_id.as_bytes(), pool_id.0, to_eth_i256(delta_amount));
        submit_and_wait(call, self.policy).await
    }
}

/// Registry duplicate check: matches the registry's revert reason.
pub fn is_already_executed(err: &ChainWriteError) -> bool {
    match err {
        ChainWriteError::Reverted { reason: Some(reason) } => {
            reason.contains(ALREADY_EXECUTED_REASON)
        }
        // Some nodes only surface the reason inside the RPC error text.
        ChainWriteError::Submission(message) => message.contains(ALREADY_EXECUTED_REASON),
        _ => false,
    }
}

async fn submit_and_wait<M: Middleware>(
    call: ContractCall<M, ()>,
    policy: WritePolicy,
) -> Result<WriteReceipt, ChainWriteError> {
    let pending = bounded(policy.call_timeout, call.send())
        .await
        .map_err(ChainWriteError::Timeout)?
        .map_err(classify_contract_error::<M>)?;
    let tx_hash = from_eth_h256(pending.tx_hash());
    debug!(tx = %tx_hash, "transaction submitted, waiting for finalization");

    // Unbounded once broadcast; the next write must not share this nonce.
    let receipt = pending
        .confirmations(policy.confirmations)
        .await
        .map_err(|e| ChainWriteError::Unconfirmed {
            tx_hash,
            reason: e.to_string(),
        })?
        .ok_or(ChainWriteError::Dropped { tx_hash })?;

    if receipt.status == Some(U64::zero()) {
        return Err(ChainWriteError::Reverted { reason: None });
    }

    Ok(WriteReceipt {
        tx_hash,
        block_number: receipt.block_number.map(|b| b.as_u64()),
    })
}

fn classify_contract_error<M: Middleware>(err: ContractError<M>) -> ChainWriteError {
    if let Some(data) = err.as_revert() {
        return ChainWriteError::Reverted {
            reason: decode_revert_reason(data),
        };
    }
    // Gas estimation failures arrive as JSON-RPC errors: "execution reverted: <reason>".
    if let Some(response) = err
        .as_middleware_error()
        .and_then(|e| e.as_error_response())
    {
        if let Some(rest) = response.message.strip_prefix("execution reverted") {
            let reason = rest.trim_start_matches(':').trim();
            return ChainWriteError::Reverted {
                reason: (!reason.is_empty()).then(|| reason.to_string()),
            };
        }
    }
    ChainWriteError::Submission(err.to_string())
}

/// Decode a Solidity `Error(string)` revert payload.
fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    match abi::decode(&[ParamType::String], payload).ok()?.pop()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_string(reason: &str) -> Vec<u8> {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(abi::encode(&[Token::String(reason.into())]));
        data
    }

    #[test]
    fn test_decodes_error_string_revert() {
        assert_eq!(
            decode_revert_reason(&error_string(ALREADY_EXECUTED_REASON)).as_deref(),
            Some(ALREADY_EXECUTED_REASON)
        );
    }

    #[test]
    fn test_ignores_custom_errors() {
        // `AlreadyInitialized(address)` style custom error, not `Error(string)`.
        let mut data = vec![0xde, 0xad, 0xbe, 0xef];
        data.extend([0u8; 32]);
        assert_eq!(decode_revert_reason(&data), None);
        assert_eq!(decode_revert_reason(&[]), None);
    }

    #[test]
    fn test_already_executed_detection() {
        assert!(is_already_executed(&ChainWriteError::Reverted {
            reason: Some("Intent already executed".into()),
        }));
        assert!(is_already_executed(&ChainWriteError::Submission(
            "(code: 3, message: execution reverted: Intent already executed, data: None)".into()
        )));
        assert!(!is_already_executed(&ChainWriteError::Reverted { reason: None }));
        assert!(!is_already_executed(&ChainWriteError::Reverted {
            reason: Some("Ownable: caller is not the owner".into()),
        }));
        assert!(!is_already_executed(&ChainWriteError::Timeout(Duration::from_secs(1))));
    }
}
