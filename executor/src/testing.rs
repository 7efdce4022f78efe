//! In-memory stand-ins for the chain-facing traits.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy_primitives::{Address, B256, I256};
use async_trait::async_trait;
use stableflow_types::{IntentId, RebalanceIntent};
use tokio::sync::mpsc;

use crate::{
    errors::{ChainWriteError, IngestError, PolicyError},
    ingest::IntentSource,
    policy::PolicySource,
    settlement::{
        evm::{is_already_executed, ALREADY_EXECUTED_REASON},
        ExecutionRegistry, SettlementVault, WriteReceipt,
    },
};

#[derive(Clone, Default)]
pub struct FakePolicySource {
    records: Arc<Mutex<HashMap<String, String>>>,
    bound: bool,
    hanging: bool,
    chain_id: u64,
    queried: Arc<Mutex<Vec<B256>>>,
}

impl FakePolicySource {
    pub fn bound<K: Into<String>, V: Into<String>>(records: impl IntoIterator<Item = (K, V)>) -> Self {
        let records = records.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            records: Arc::new(Mutex::new(records)),
            bound: true,
            chain_id: 11_155_111,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::bound(Vec::<(String, String)>::new())
    }

    pub fn unbound(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    /// A source whose resolver lookup never answers.
    pub fn hanging() -> Self {
        Self {
            hanging: true,
            ..Self::empty()
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.records.lock().unwrap().insert(key.into(), value.into());
    }

    pub fn queried_nodes(&self) -> Vec<B256> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl PolicySource for FakePolicySource {
    async fn resolver(&self, _node: B256) -> Result<Option<Address>, PolicyError> {
        if self.hanging {
            std::future::pending::<()>().await;
        }
        Ok(self.bound.then(|| Address::repeat_byte(0xe5)))
    }

    async fn text(&self, _resolver: Address, node: B256, key: &str) -> Result<String, PolicyError> {
        self.queried.lock().unwrap().push(node);
        Ok(self.records.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    async fn chain_id(&self) -> Result<u64, PolicyError> {
        Ok(self.chain_id)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum RegistryBehaviour {
    /// Record ids; revert with the duplicate reason on a repeat.
    Record,
    Fail(&'static str),
    Revert(&'static str),
    /// Record the id, then report that the confirmation wait timed out.
    RecordThenTimeout,
}

#[derive(Default)]
struct RegistryState {
    marked: Vec<(IntentId, B256, I256)>,
    attempts: usize,
}

#[derive(Clone)]
pub struct FakeRegistry {
    state: Arc<Mutex<RegistryState>>,
    behaviour: RegistryBehaviour,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::with_behaviour(RegistryBehaviour::Record)
    }

    pub fn with_behaviour(behaviour: RegistryBehaviour) -> Self {
        Self {
            state: Arc::default(),
            behaviour,
        }
    }

    pub fn marked(&self) -> Vec<(IntentId, B256, I256)> {
        self.state.lock().unwrap().marked.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

#[async_trait]
impl ExecutionRegistry for FakeRegistry {
    async fn mark_executed(
        &self,
        intent_id: IntentId,
        pool_id: B256,
        imbalance_bps: I256,
    ) -> Result<WriteReceipt, ChainWriteError> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        match self.behaviour {
            RegistryBehaviour::Fail(message) => Err(ChainWriteError::Submission(message.into())),
            RegistryBehaviour::Revert(reason) => Err(ChainWriteError::Reverted {
                reason: Some(reason.into()),
            }),
            RegistryBehaviour::Record | RegistryBehaviour::RecordThenTimeout => {
                if state.marked.iter().any(|(id, _, _)| *id == intent_id) {
                    return Err(ChainWriteError::Reverted {
                        reason: Some(ALREADY_EXECUTED_REASON.into()),
                    });
                }
                state.marked.push((intent_id, pool_id, imbalance_bps));
                if matches!(self.behaviour, RegistryBehaviour::RecordThenTimeout)
                    && state.marked.len() == 1
                {
                    return Err(ChainWriteError::Timeout(Duration::from_secs(30)));
                }
                Ok(WriteReceipt {
                    tx_hash: B256::with_last_byte(state.marked.len() as u8),
                    block_number: Some(state.attempts as u64),
                })
            }
        }
    }

    fn is_duplicate_execution(&self, err: &ChainWriteError) -> bool {
        is_already_executed(err)
    }
}

#[derive(Clone, Default)]
pub struct FakeVault {
    settlements: Arc<Mutex<Vec<(IntentId, B256, I256)>>>,
    failing: bool,
}

impl FakeVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn settlements(&self) -> Vec<(IntentId, B256, I256)> {
        self.settlements.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementVault for FakeVault {
    async fn settle_rebalance(
        &self,
        intent_id: IntentId,
        pool_id: B256,
        delta_amount: I256,
    ) -> Result<WriteReceipt, ChainWriteError> {
        if self.failing {
            return Err(ChainWriteError::Submission("arc rpc unavailable".into()));
        }
        let mut settlements = self.settlements.lock().unwrap();
        settlements.push((intent_id, pool_id, delta_amount));
        Ok(WriteReceipt {
            tx_hash: B256::with_last_byte(0x80 | settlements.len() as u8),
            block_number: None,
        })
    }
}

/// Historical intents plus a queue of live batches; each subscription drains one batch and ends.
#[derive(Clone)]
pub struct FakeIntentSource {
    head: u64,
    head_fails: bool,
    history: Vec<RebalanceIntent>,
    live: Arc<Mutex<VecDeque<Vec<RebalanceIntent>>>>,
    failing_subscriptions: Arc<Mutex<usize>>,
    ranges: Arc<Mutex<Vec<(u64, u64)>>>,
    subscriptions: Arc<Mutex<usize>>,
}

impl FakeIntentSource {
    pub fn new(head: u64, history: Vec<RebalanceIntent>, live: Vec<Vec<RebalanceIntent>>) -> Self {
        Self {
            head,
            head_fails: false,
            history,
            live: Arc::new(Mutex::new(live.into())),
            failing_subscriptions: Arc::default(),
            ranges: Arc::default(),
            subscriptions: Arc::default(),
        }
    }

    /// The first `count` subscriptions error before delivering anything.
    pub fn with_failing_subscriptions(self, count: usize) -> Self {
        *self.failing_subscriptions.lock().unwrap() = count;
        self
    }

    pub fn with_failing_head(mut self) -> Self {
        self.head_fails = true;
        self
    }

    pub fn backfill_ranges(&self) -> Vec<(u64, u64)> {
        self.ranges.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> usize {
        *self.subscriptions.lock().unwrap()
    }
}

#[async_trait]
impl IntentSource for FakeIntentSource {
    async fn head_block(&self) -> Result<u64, IngestError> {
        if self.head_fails {
            return Err(IngestError::Query("eth_blockNumber: connection refused".into()));
        }
        Ok(self.head)
    }

    async fn backfill(&self, from: u64, to: u64) -> Result<Vec<RebalanceIntent>, IngestError> {
        self.ranges.lock().unwrap().push((from, to));
        Ok(self
            .history
            .iter()
            .filter(|i| i.block_number.is_some_and(|b| (from..=to).contains(&b)))
            .cloned()
            .collect())
    }

    async fn stream_live(&self, sink: mpsc::Sender<RebalanceIntent>) -> Result<(), IngestError> {
        *self.subscriptions.lock().unwrap() += 1;
        {
            let mut failing = self.failing_subscriptions.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(IngestError::Subscription("filter not found".into()));
            }
        }
        let batch = self.live.lock().unwrap().pop_front().unwrap_or_default();
        for intent in batch {
            if sink.send(intent).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
