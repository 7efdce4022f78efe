//! Start-up wiring: providers, signer, contract handles and the pipeline built on them.

use std::{sync::Arc, time::Duration};

use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
};
use tracing::info;

use crate::{
    bounded::bounded,
    config::{PolicySettings, RunSettings},
    convert::from_eth_address,
    errors::ConfigError,
    ingest::{HookEventSource, IngestSettings},
    pipeline::IntentPipeline,
    policy::{ens::EnsPolicySource, PolicyResolver},
    settlement::{
        evm::{EvmExecutionRegistry, EvmSettlementVault, WritePolicy},
        SettlementOrchestrator,
    },
};

pub type ReadClient = Provider<Http>;
pub type WriteClient = SignerMiddleware<Provider<Http>, LocalWallet>;
pub type EnsResolver = PolicyResolver<EnsPolicySource<ReadClient>>;
pub type ExecutorPipeline = IntentPipeline<
    EnsPolicySource<ReadClient>,
    EvmExecutionRegistry<WriteClient>,
    EvmSettlementVault<WriteClient>,
>;

/// Everything the `run` and `replay` commands need.
pub struct ExecutorContext {
    pub pipeline: ExecutorPipeline,
    pub source: Arc<HookEventSource<ReadClient>>,
    pub ingest: IngestSettings,
}

impl ExecutorContext {
    pub async fn connect(settings: &RunSettings) -> Result<Self, ConfigError> {
        let policy = &settings.policy;
        let source_provider = http_provider(&policy.rpc_url, policy.poll_interval)?;
        let arc_provider = http_provider(&settings.arc_rpc_url, policy.poll_interval)?;

        let source_chain = chain_id(&source_provider, &policy.rpc_url, policy.call_timeout).await?;
        let arc_chain = chain_id(&arc_provider, &settings.arc_rpc_url, policy.call_timeout).await?;

        let wallet: LocalWallet =
            settings
                .private_key
                .parse()
                .map_err(|e: ethers::signers::WalletError| ConfigError::Invalid {
                    field: "EXECUTOR_PRIVATE_KEY",
                    reason: e.to_string(),
                })?;
        let caller = from_eth_address(wallet.address());

        let source_signer = Arc::new(SignerMiddleware::new(
            (*source_provider).clone(),
            wallet.clone().with_chain_id(source_chain),
        ));
        let arc_signer = Arc::new(SignerMiddleware::new(
            (*arc_provider).clone(),
            wallet.with_chain_id(arc_chain),
        ));

        let write_policy = WritePolicy {
            confirmations: settings.confirmations,
            call_timeout: policy.call_timeout,
        };
        let orchestrator = SettlementOrchestrator::new(
            EvmExecutionRegistry::new(settings.registry, source_signer, write_policy),
            EvmSettlementVault::new(settings.vault, arc_signer, write_policy),
            settings.unit_scale,
        );
        let resolver = PolicyResolver::new(
            EnsPolicySource::new(source_provider.clone(), policy.ens_registry),
            policy.call_timeout,
        );
        let pipeline = IntentPipeline::new(resolver, orchestrator, policy.ens_name.clone(), caller)
            .with_watched_hook(settings.hook);

        info!(
            %caller,
            source_chain,
            arc_chain,
            registry = %settings.registry,
            vault = %settings.vault,
            hook = %settings.hook,
            ens_name = %policy.ens_name,
            "executor context ready"
        );

        Ok(Self {
            pipeline,
            source: Arc::new(HookEventSource::new(
                settings.hook,
                source_provider,
                policy.call_timeout,
            )),
            ingest: settings.ingest,
        })
    }
}

/// Read-only resolver for the `policy` command; no signer required.
pub fn policy_resolver(settings: &PolicySettings) -> Result<EnsResolver, ConfigError> {
    let provider = http_provider(&settings.rpc_url, settings.poll_interval)?;
    Ok(PolicyResolver::new(
        EnsPolicySource::new(provider, settings.ens_registry),
        settings.call_timeout,
    ))
}

fn http_provider(url: &str, poll_interval: Duration) -> Result<Arc<ReadClient>, ConfigError> {
    let provider = Provider::<Http>::try_from(url).map_err(|e| ConfigError::Connect {
        endpoint: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Arc::new(provider.interval(poll_interval)))
}

async fn chain_id(
    provider: &ReadClient,
    url: &str,
    call_timeout: Option<Duration>,
) -> Result<u64, ConfigError> {
    let connect_error = |reason: String| ConfigError::Connect {
        endpoint: url.to_string(),
        reason,
    };
    let id = bounded(call_timeout, provider.get_chainid())
        .await
        .map_err(|limit| connect_error(format!("timed out after {limit:?}")))?
        .map_err(|e| connect_error(e.to_string()))?;
    Ok(id.as_u64())
}
