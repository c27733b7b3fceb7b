use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use common::events::WireEvent;
use feed::{ChangeBatch, DocChange};
use storage::{ClaimOutcome, DeliveryTracker};

use crate::services::push_service::PushDispatcher;

/// Claims observed documents and fans the winners out.
///
/// Claim-before-send: only the instance that wins the store's flag flip
/// serializes the wire event and fires the push alert. A send that fails
/// afterwards is never rolled back (lost beats duplicated); a claim lost to
/// another instance is silently skipped.
pub struct RelayService {
    id: Uuid,
    changes_rx: broadcast::Receiver<Arc<ChangeBatch>>,
    tracker: DeliveryTracker,
    events_tx: broadcast::Sender<Arc<WireEvent>>,
    push: Option<Arc<PushDispatcher>>,
}

#[async_trait]
impl Actor for RelayService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::RelayActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Starting relay dispatch service");

        loop {
            match self.changes_rx.recv().await {
                Ok(batch) => self.handle_batch(&batch).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Nothing is lost: unclaimed documents reappear in the
                    // next feed pass.
                    warn!("Relay lagged behind the feed, skipped {} batches", n);
                }
                Err(_) => {
                    heartbeat_handle.abort();
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.id,
                            "Change feed channel closed unexpectedly.".to_string(),
                        ))
                        .await?;
                    bail!("Change feed channel closed unexpectedly.");
                }
            }
        }
    }
}

impl RelayService {
    pub fn new(
        changes_rx: broadcast::Receiver<Arc<ChangeBatch>>,
        tracker: DeliveryTracker,
        events_tx: broadcast::Sender<Arc<WireEvent>>,
        push: Option<Arc<PushDispatcher>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            changes_rx,
            tracker,
            events_tx,
            push,
        }
    }

    async fn handle_batch(&self, batch: &ChangeBatch) {
        for change in &batch.changes {
            let target = change.claim_target();

            match self.tracker.try_claim(&target).await {
                Ok(ClaimOutcome::Claimed) => {
                    let event = match change {
                        DocChange::Signal(signal) => WireEvent::new_signal(signal.clone()),
                        DocChange::Trade(event) => WireEvent::trade_update(event.clone()),
                    };

                    // No receivers just means nobody is connected right now;
                    // the claim stands either way.
                    let receivers = self.events_tx.send(Arc::new(event)).unwrap_or(0);
                    debug!(
                        "Delivered {}/{} to {} clients",
                        target.collection(),
                        target.id(),
                        receivers
                    );

                    if let (DocChange::Signal(signal), Some(push)) = (change, &self.push) {
                        if let Err(e) = push.send_signal_alert(signal).await {
                            error!("Push alert for {} failed: {}", signal.id, e);
                        }
                    }
                }
                Ok(ClaimOutcome::AlreadyClaimed) => {
                    debug!(
                        "Skipping {}/{}: already handled",
                        target.collection(),
                        target.id()
                    );
                }
                Err(e) => {
                    // Leave the document unclaimed; the feed offers it again.
                    error!(
                        "Claim on {}/{} failed: {}",
                        target.collection(),
                        target.id(),
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::models::{Direction, Signal};
    use storage::{DocumentStore, MemoryStore};

    fn pending_signal(id: &str) -> Signal {
        Signal {
            id: id.to_string(),
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: 2374.5,
            stop_loss: 2360.0,
            take_profit: 2395.0,
            confidence: 0.8,
            reasoning: String::new(),
            timeframe: "5m".to_string(),
            created_at: Utc::now(),
            delivered: false,
        }
    }

    fn service_with(
        store: Arc<MemoryStore>,
        events_tx: broadcast::Sender<Arc<WireEvent>>,
    ) -> RelayService {
        let (_feed_tx, feed_rx) = broadcast::channel(16);
        RelayService::new(feed_rx, DeliveryTracker::new(store), events_tx, None)
    }

    #[tokio::test]
    async fn claimed_documents_are_fanned_out_once() {
        let store = Arc::new(MemoryStore::new());
        store.insert_signal(&pending_signal("s1")).await.unwrap();

        let (events_tx, mut events_rx) = broadcast::channel(16);
        let service = service_with(store.clone(), events_tx);

        let batch = ChangeBatch {
            changes: vec![DocChange::Signal(
                store.pending_signals().await.unwrap().remove(0),
            )],
        };

        service.handle_batch(&batch).await;
        // A second offer of the same document is a no-op.
        service.handle_batch(&batch).await;

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(&*event, WireEvent::NewSignal { data, .. } if data.id == "s1"));
        assert!(events_rx.try_recv().is_err());
        assert!(store.signal("s1").await.unwrap().delivered);
    }
}
