use core::fmt;

use alloy_primitives::{keccak256, B256, I256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// One `RebalanceIntent` signal as observed on the source chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceIntent {
    /// Uniswap v4 pool id (opaque 32-byte identifier).
    pub pool_id: B256,
    /// Deviation in basis points.
    pub imbalance_bps: I256,
    /// Transaction that emitted the event, once observed.
    pub tx_hash: Option<B256>,
    /// Block that included the event, once observed.
    pub block_number: Option<u64>,
}

impl RebalanceIntent {
    pub fn observed(pool_id: B256, imbalance_bps: I256, tx_hash: B256, block_number: u64) -> Self {
        Self {
            pool_id,
            imbalance_bps,
            tx_hash: Some(tx_hash),
            block_number: Some(block_number),
        }
    }

    /// Intent id, available only once the block number is known.
    pub fn intent_id(&self) -> Option<IntentId> {
        self.block_number
            .map(|block| derive_intent_id(self.pool_id, self.imbalance_bps, block))
    }
}

/// Cross-chain correlation key for an intent.
///
/// Both the registry and the vault key their duplicate checks on this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub B256);

impl IntentId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// `keccak256(abi.encode(bytes32 poolId, int256 imbalanceBps, uint256 blockNumber))`.
pub fn derive_intent_id(pool_id: B256, imbalance_bps: I256, block_number: u64) -> IntentId {
    let encoded = (pool_id, imbalance_bps, U256::from(block_number)).abi_encode();
    IntentId(keccak256(encoded))
}
