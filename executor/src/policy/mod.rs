//! Governance policy resolution.
//!
//! Policy is re-read for every intent: governance may flip status, executor or mode between two
//! intents and nothing is cached.

pub mod ens;

use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use stableflow_types::{policy::keys, PolicyRecords, PolicySnapshot};
use tracing::debug;

use crate::{bounded::bounded, ens::namehash, errors::PolicyError};

pub use self::ens::EnsPolicySource;

/// Key/value text-record store addressed by ENS node.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Resolver bound to `node`, or `None` when the name has no resolver.
    async fn resolver(&self, node: B256) -> Result<Option<Address>, PolicyError>;

    /// Text record `key` for `node`. Absent records read as an empty string.
    async fn text(&self, resolver: Address, node: B256, key: &str) -> Result<String, PolicyError>;

    /// Chain the store lives on (used for diagnostics only).
    async fn chain_id(&self) -> Result<u64, PolicyError>;
}

/// Fetches text records and decodes them into a [`PolicySnapshot`].
pub struct PolicyResolver<S> {
    source: S,
    call_timeout: Option<Duration>,
}

impl<S: PolicySource> PolicyResolver<S> {
    pub fn new(source: S, call_timeout: Option<Duration>) -> Self {
        Self {
            source,
            call_timeout,
        }
    }

    pub async fn resolve(&self, name: &str) -> Result<PolicySnapshot, PolicyError> {
        let node = namehash(name);

        let Some(resolver) = self.call(self.source.resolver(node)).await? else {
            let chain_id = self.call(self.source.chain_id()).await?;
            return Err(PolicyError::ResolverNotFound {
                name: name.to_string(),
                chain_id,
            });
        };

        let mut records = PolicyRecords::new();
        for key in keys::ALL {
            let value = self.call(self.source.text(resolver, node, key)).await?;
            records.insert(key, value);
        }

        let snapshot = PolicySnapshot::from_records(&records)?;
        debug!(%name, %resolver, ?snapshot, "policy resolved");
        Ok(snapshot)
    }

    async fn call<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, PolicyError>>,
    ) -> Result<T, PolicyError> {
        bounded(self.call_timeout, fut)
            .await
            .map_err(PolicyError::Timeout)?
    }
}
