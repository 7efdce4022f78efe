//! `RebalanceIntent` events from the hook contract.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, I256};
use async_trait::async_trait;
use ethers::{contract::LogMeta, providers::Middleware};
use stableflow_types::RebalanceIntent;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::IntentSource;
use crate::{
    bindings::{RebalanceIntentFilter, StableFlowHook},
    bounded::bounded,
    convert::{from_eth_h256, from_eth_u256, to_eth_address},
    errors::IngestError,
};

pub struct HookEventSource<M> {
    client: Arc<M>,
    hook: StableFlowHook<M>,
    call_timeout: Option<Duration>,
}

impl<M: Middleware + 'static> HookEventSource<M> {
    pub fn new(hook: Address, client: Arc<M>, call_timeout: Option<Duration>) -> Self {
        Self {
            hook: StableFlowHook::new(to_eth_address(hook), client.clone()),
            client,
            call_timeout,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> IntentSource for HookEventSource<M> {
    async fn head_block(&self) -> Result<u64, IngestError> {
        bounded(self.call_timeout, self.client.get_block_number())
            .await
            .map_err(IngestError::Timeout)?
            .map(|n| n.as_u64())
            .map_err(|e| IngestError::Query(e.to_string()))
    }

    async fn backfill(&self, from: u64, to: u64) -> Result<Vec<RebalanceIntent>, IngestError> {
        let event = self
            .hook
            .rebalance_intent_filter()
            .from_block(from)
            .to_block(to);
        let mut logs = bounded(self.call_timeout, event.query_with_meta())
            .await
            .map_err(IngestError::Timeout)?
            .map_err(|e| IngestError::Query(e.to_string()))?;

        logs.sort_by_key(|(_, meta)| (meta.block_number, meta.log_index));
        Ok(logs
            .into_iter()
            .filter_map(|(event, meta)| to_intent(event, &meta))
            .collect())
    }

    async fn stream_live(&self, sink: mpsc::Sender<RebalanceIntent>) -> Result<(), IngestError> {
        let event = self.hook.rebalance_intent_filter();
        let mut stream = Box::pin(
            event
                .stream_with_meta()
                .await
                .map_err(|e| IngestError::Subscription(e.to_string()))?,
        );

        while let Some(item) = stream.next().await {
            let (event, meta) = item.map_err(|e| IngestError::Subscription(e.to_string()))?;
            let Some(intent) = to_intent(event, &meta) else {
                continue;
            };
            if sink.send(intent).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// The event carries `uint256`; values beyond `int256::MAX` cannot be a real imbalance.
fn to_intent(event: RebalanceIntentFilter, meta: &LogMeta) -> Option<RebalanceIntent> {
    let pool_id = B256::from(event.pool_id);
    let imbalance_bps = I256::from_raw(from_eth_u256(event.imbalance_bps));
    let block_number = meta.block_number.as_u64();
    let tx_hash = from_eth_h256(meta.transaction_hash);

    if imbalance_bps.is_negative() {
        warn!(%pool_id, block = block_number, tx = %tx_hash, "imbalance exceeds int256, dropping event");
        return None;
    }

    debug!(%pool_id, %imbalance_bps, block = block_number, tx = %tx_hash, "rebalance intent detected");
    Some(RebalanceIntent::observed(pool_id, imbalance_bps, tx_hash, block_number))
}

#[cfg(test)]
mod tests {
    use ethers::types::{H256, U256, U64};

    use super::*;

    fn meta(block: u64) -> LogMeta {
        LogMeta {
            address: Default::default(),
            block_number: U64::from(block),
            block_hash: H256::zero(),
            transaction_hash: H256::repeat_byte(0x0a),
            transaction_index: U64::zero(),
            log_index: U256::zero(),
        }
    }

    #[test]
    fn test_event_becomes_observed_intent() {
        let event = RebalanceIntentFilter {
            pool_id: [0x42; 32],
            imbalance_bps: U256::from(375u64),
        };
        let intent = to_intent(event, &meta(8_100_200)).unwrap();
        assert_eq!(intent.pool_id, B256::repeat_byte(0x42));
        assert_eq!(intent.imbalance_bps, I256::try_from(375).unwrap());
        assert_eq!(intent.block_number, Some(8_100_200));
        assert_eq!(intent.tx_hash, Some(B256::repeat_byte(0x0a)));
    }

    #[test]
    fn test_oversized_imbalance_is_dropped() {
        let event = RebalanceIntentFilter {
            pool_id: [0x42; 32],
            imbalance_bps: U256::MAX,
        };
        assert!(to_intent(event, &meta(1)).is_none());
    }
}
