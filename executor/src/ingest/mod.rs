//! Intent ingestion: a bounded backfill window plus a live subscription, feeding one serial
//! consumer.
//!
//! Live delivery is at-most-once and best effort. When the subscription drops, a fresh one is
//! opened from the current head; intents emitted in between are only recovered by the next
//! start-up backfill.

pub mod evm;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use stableflow_types::{ExecutionOutcome, RebalanceIntent};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::errors::{ExecutionError, IngestError};

pub use self::evm::HookEventSource;

/// Where intents come from.
#[async_trait]
pub trait IntentSource: Send + Sync + 'static {
    async fn head_block(&self) -> Result<u64, IngestError>;

    /// Intents emitted in `[from, to]`, in block then log order.
    async fn backfill(&self, from: u64, to: u64) -> Result<Vec<RebalanceIntent>, IngestError>;

    /// Forward live intents into `sink` until the stream ends, errors, or the sink closes.
    async fn stream_live(&self, sink: mpsc::Sender<RebalanceIntent>) -> Result<(), IngestError>;
}

/// Processes one intent to completion.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    async fn handle(&self, intent: RebalanceIntent) -> Result<ExecutionOutcome, ExecutionError>;
}

#[derive(Clone, Copy, Debug)]
pub struct IngestSettings {
    /// Trailing blocks re-scanned at start-up.
    pub backfill_blocks: u64,
    pub queue_capacity: usize,
    pub reconnect_delay: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            backfill_blocks: 200,
            queue_capacity: 256,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

pub struct IntentIngestor<S> {
    source: Arc<S>,
    settings: IngestSettings,
}

impl<S: IntentSource> IntentIngestor<S> {
    pub fn new(source: Arc<S>, settings: IngestSettings) -> Self {
        Self { source, settings }
    }

    /// Run until `shutdown` flips (or its sender is dropped).
    ///
    /// Intents are handed to `handler` strictly one at a time. Shutdown is only observed between
    /// intents, so an in-flight settlement always runs to completion.
    pub async fn run<H: IntentHandler>(
        &self,
        handler: &H,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        let (tx, mut rx) = mpsc::channel(self.settings.queue_capacity);

        let live = tokio::spawn(live_loop(
            self.source.clone(),
            tx.clone(),
            self.settings.reconnect_delay,
        ));
        let backfill = match self.source.head_block().await {
            Ok(head) => {
                let from = head.saturating_sub(self.settings.backfill_blocks);
                Some(tokio::spawn(backfill(self.source.clone(), tx, from, head)))
            }
            Err(err) => {
                warn!(error = %err, "head block unavailable; skipping backfill");
                None
            }
        };

        loop {
            let intent = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = rx.recv() => match next {
                    Some(intent) => intent,
                    None => break,
                },
            };
            dispatch(handler, intent).await;
        }

        info!("intake stopped");
        live.abort();
        if let Some(backfill) = backfill {
            backfill.abort();
        }
        Ok(())
    }
}

async fn backfill<S: IntentSource>(
    source: Arc<S>,
    sink: mpsc::Sender<RebalanceIntent>,
    from: u64,
    to: u64,
) {
    let intents = match source.backfill(from, to).await {
        Ok(intents) => intents,
        Err(err) => {
            warn!(from, to, error = %err, "backfill failed; continuing with live intents only");
            return;
        }
    };
    info!(from, to, count = intents.len(), "backfill window loaded");
    for intent in intents {
        if sink.send(intent).await.is_err() {
            return;
        }
    }
}

async fn live_loop<S: IntentSource>(
    source: Arc<S>,
    sink: mpsc::Sender<RebalanceIntent>,
    reconnect_delay: Duration,
) {
    loop {
        info!("listening for RebalanceIntent");
        match source.stream_live(sink.clone()).await {
            Ok(()) => warn!("live subscription ended"),
            Err(err) => warn!(error = %err, "live subscription failed"),
        }
        if sink.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn dispatch<H: IntentHandler>(handler: &H, intent: RebalanceIntent) {
    let pool_id = intent.pool_id;
    let block = intent.block_number;
    let intent_id = intent.intent_id();
    // A failing intent must never take the loop down with it.
    if let Err(err) = handler.handle(intent).await {
        error!(
            intent_id = ?intent_id.map(|id| id.to_string()),
            %pool_id,
            ?block,
            outcome = "failed",
            reason = %err,
            "intent not processed"
        );
    }
}
