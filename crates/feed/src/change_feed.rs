use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use common::models::{Signal, TradeEvent};
use storage::{ClaimTarget, DocumentStore, StoreError};

const MAX_POLL_FAILURES: u32 = 5;
const FAILURE_BACKOFF_MS: u64 = 500;

/// One changed document observed in the store.
#[derive(Debug, Clone)]
pub enum DocChange {
    Signal(Signal),
    Trade(TradeEvent),
}

impl DocChange {
    pub fn claim_target(&self) -> ClaimTarget {
        match self {
            DocChange::Signal(signal) => ClaimTarget::Signal {
                id: signal.id.clone(),
            },
            DocChange::Trade(event) => ClaimTarget::TradeEvent {
                id: event.id.clone(),
            },
        }
    }

    fn doc_key(&self) -> (&'static str, &str) {
        match self {
            DocChange::Signal(signal) => ("signals", signal.id.as_str()),
            DocChange::Trade(event) => ("trade_events", event.id.as_str()),
        }
    }
}

/// A coalesced batch of changes from one observation pass.
#[derive(Debug)]
pub struct ChangeBatch {
    pub changes: Vec<DocChange>,
}

/// Watches the store's unhandled working set and multiplexes it to every
/// consumer over one shared broadcast channel.
///
/// The first pass naturally replays the whole backlog (every document whose
/// flag is still false), so a freshly started feed never misses work done
/// while the process was down; subsequent passes pick up live writes. A
/// document stays in the working set until a consumer claims it, so an
/// unclaimed document is simply offered again on the next pass.
pub struct ChangeFeed {
    id: Uuid,
    store: Arc<dyn DocumentStore>,
    changes_tx: broadcast::Sender<Arc<ChangeBatch>>,
    poll_interval: Duration,
}

#[async_trait]
impl Actor for ChangeFeed {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::FeedActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Starting change feed (reconciliation pass first)");
        let mut failures = 0u32;

        loop {
            match self.poll_once().await {
                Ok(batch) => {
                    failures = 0;
                    if !batch.changes.is_empty() {
                        debug!("Observed {} changed documents", batch.changes.len());
                        // No receivers yet is fine; the batch reappears on
                        // the next pass as long as nothing claimed it.
                        let _ = self.changes_tx.send(Arc::new(batch));
                    }
                    time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_POLL_FAILURES {
                        heartbeat_handle.abort();
                        supervisor_tx
                            .send(ControlMessage::Error(
                                self.id,
                                format!("Change feed halting after {} failures: {}", failures, e),
                            ))
                            .await?;
                        bail!("Store unreachable after {} attempts: {}", failures, e);
                    }

                    let backoff =
                        Duration::from_millis(FAILURE_BACKOFF_MS * 2_u64.pow(failures - 1));
                    warn!(
                        "Store poll failed ({}), backing off {:?} ({}/{})",
                        e, backoff, failures, MAX_POLL_FAILURES
                    );
                    time::sleep(backoff).await;
                }
            }
        }
    }
}

impl ChangeFeed {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        changes_tx: broadcast::Sender<Arc<ChangeBatch>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            changes_tx,
            poll_interval,
        }
    }

    async fn poll_once(&self) -> Result<ChangeBatch, StoreError> {
        let mut changes: Vec<DocChange> = Vec::new();

        for signal in self.store.pending_signals().await? {
            changes.push(DocChange::Signal(signal));
        }
        for event in self.store.pending_trade_events().await? {
            changes.push(DocChange::Trade(event));
        }

        Ok(ChangeBatch {
            changes: coalesce(changes),
        })
    }
}

/// Last-write-wins per document id: if the same document shows up more than
/// once in a pass, only its latest state is forwarded.
fn coalesce(changes: Vec<DocChange>) -> Vec<DocChange> {
    let mut latest: HashMap<(&'static str, String), usize> = HashMap::new();
    for (idx, change) in changes.iter().enumerate() {
        let (collection, id) = change.doc_key();
        latest.insert((collection, id.to_string()), idx);
    }

    changes
        .into_iter()
        .enumerate()
        .filter(|(idx, change)| {
            let (collection, id) = change.doc_key();
            latest[&(collection, id.to_string())] == *idx
        })
        .map(|(_, change)| change)
        .collect()
}
