//! ENS name hashing (EIP-137).

use alloy_primitives::B256;
use ethers::providers::ens;

use crate::convert::from_eth_h256;

/// EIP-137 node for `name`, with labels lowercased first.
///
/// Full UTS-46 normalisation is left to whoever publishes the name.
pub fn namehash(name: &str) -> B256 {
    from_eth_h256(ens::namehash(&name.to_lowercase()))
}
