//! Per-intent pipeline: derive id, resolve policy, gate, settle.

use alloy_primitives::Address;
use async_trait::async_trait;
use stableflow_types::{ExecutionOutcome, IntentId, PolicySnapshot, RebalanceIntent};
use tracing::{info, info_span, warn, Instrument};

use crate::{
    errors::ExecutionError,
    gate::{self, GateDecision},
    ingest::IntentHandler,
    policy::{PolicyResolver, PolicySource},
    settlement::{ExecutionRegistry, SettlementOrchestrator, SettlementVault},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phases {
    Both,
    SettleOnly,
}

pub struct IntentPipeline<P, R, V> {
    resolver: PolicyResolver<P>,
    orchestrator: SettlementOrchestrator<R, V>,
    policy_name: String,
    caller: Address,
    watched_hook: Option<Address>,
}

impl<P, R, V> IntentPipeline<P, R, V>
where
    P: PolicySource,
    R: ExecutionRegistry,
    V: SettlementVault,
{
    pub fn new(
        resolver: PolicyResolver<P>,
        orchestrator: SettlementOrchestrator<R, V>,
        policy_name: impl Into<String>,
        caller: Address,
    ) -> Self {
        Self {
            resolver,
            orchestrator,
            policy_name: policy_name.into(),
            caller,
            watched_hook: None,
        }
    }

    /// Hook the executor listens to; a policy naming a different hook is logged.
    pub fn with_watched_hook(mut self, hook: Address) -> Self {
        self.watched_hook = Some(hook);
        self
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    pub async fn process(&self, intent: &RebalanceIntent) -> Result<ExecutionOutcome, ExecutionError> {
        self.run(intent, Phases::Both).await
    }

    /// Gate as usual, then run only the vault phase.
    pub async fn replay_settle_only(
        &self,
        intent: &RebalanceIntent,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        self.run(intent, Phases::SettleOnly).await
    }

    async fn run(
        &self,
        intent: &RebalanceIntent,
        phases: Phases,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let intent_id = intent.intent_id().ok_or(ExecutionError::Unobserved)?;
        let span = info_span!("intent", %intent_id, pool_id = %intent.pool_id);
        self.run_identified(intent_id, intent, phases)
            .instrument(span)
            .await
    }

    async fn run_identified(
        &self,
        intent_id: IntentId,
        intent: &RebalanceIntent,
        phases: Phases,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        info!(
            imbalance_bps = %intent.imbalance_bps,
            block = ?intent.block_number,
            tx = ?intent.tx_hash,
            "evaluating intent"
        );

        let policy = self.resolver.resolve(&self.policy_name).await?;
        self.check_hook(&policy);

        if let GateDecision::Skip(reason) = gate::evaluate(intent, &policy, &self.caller) {
            info!(%reason, "intent skipped by policy");
            return Ok(reason.into());
        }

        let outcome = match phases {
            Phases::Both => self.orchestrator.execute(intent_id, intent).await?,
            Phases::SettleOnly => self.orchestrator.settle_only(intent_id, intent).await?,
        };
        info!(outcome = %outcome, "intent processed");
        Ok(outcome)
    }

    fn check_hook(&self, policy: &PolicySnapshot) {
        if let (Some(watched), Some(published)) = (self.watched_hook, policy.hook_address) {
            if watched != published {
                warn!(%watched, %published, "policy names a different hook than the one watched");
            }
        }
    }
}

#[async_trait]
impl<P, R, V> IntentHandler for IntentPipeline<P, R, V>
where
    P: PolicySource,
    R: ExecutionRegistry,
    V: SettlementVault,
{
    async fn handle(&self, intent: RebalanceIntent) -> Result<ExecutionOutcome, ExecutionError> {
        self.process(&intent).await
    }
}
