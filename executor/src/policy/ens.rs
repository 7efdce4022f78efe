//! ENS text records as the policy source.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use ethers::providers::Middleware;

use super::PolicySource;
use crate::{
    bindings::{EnsRegistry, EnsTextResolver},
    convert::{from_eth_address, to_eth_address},
    errors::PolicyError,
};

/// Canonical ENS registry (same address on mainnet and Sepolia).
pub const ENS_REGISTRY_ADDRESS: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

pub struct EnsPolicySource<M> {
    client: Arc<M>,
    registry: EnsRegistry<M>,
}

impl<M: Middleware + 'static> EnsPolicySource<M> {
    pub fn new(client: Arc<M>, registry: Address) -> Self {
        let registry = EnsRegistry::new(to_eth_address(registry), client.clone());
        Self { client, registry }
    }
}

#[async_trait]
impl<M: Middleware + 'static> PolicySource for EnsPolicySource<M> {
    async fn resolver(&self, node: B256) -> Result<Option<Address>, PolicyError> {
        let resolver = self
            .registry
            .resolver(node.0)
            .call()
            .await
            .map_err(|e| PolicyError::Source(e.to_string()))?;
        // The registry returns the zero address for unbound names.
        Ok((!resolver.is_zero()).then(|| from_eth_address(resolver)))
    }

    async fn text(&self, resolver: Address, node: B256, key: &str) -> Result<String, PolicyError> {
        EnsTextResolver::new(to_eth_address(resolver), self.client.clone())
            .text(node.0, key.to_string())
            .call()
            .await
            .map_err(|e| PolicyError::Source(format!("text({key}): {e}")))
    }

    async fn chain_id(&self) -> Result<u64, PolicyError> {
        self.client
            .get_chainid()
            .await
            .map(|id| id.low_u64())
            .map_err(|e| PolicyError::Source(e.to_string()))
    }
}
