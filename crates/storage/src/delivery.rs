use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::warn;

use crate::store::{ClaimOutcome, ClaimTarget, DocumentStore, StoreError};

const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF_MS: u64 = 100;

/// Gates every outbound notification behind the store's atomic flag flip.
///
/// Claiming happens *before* the send: a crash between claim and send loses
/// that one notification instead of ever duplicating it (at-most-once bias,
/// claims are never rolled back).
pub struct DeliveryTracker {
    store: Arc<dyn DocumentStore>,
}

impl DeliveryTracker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Attempts the claim, retrying transient store failures with
    /// exponential backoff before surfacing the error.
    pub async fn try_claim(&self, target: &ClaimTarget) -> Result<ClaimOutcome, StoreError> {
        let mut attempt = 0;
        loop {
            match self.store.try_claim(target).await {
                Ok(outcome) => return Ok(outcome),
                Err(StoreError::Unavailable(reason)) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return Err(StoreError::Unavailable(reason));
                    }
                    let backoff =
                        Duration::from_millis(BASE_BACKOFF_MS * 2_u64.pow(attempt - 1));
                    warn!(
                        "Claim on {}/{} failed ({}), retrying in {:?} ({}/{})",
                        target.collection(),
                        target.id(),
                        reason,
                        backoff,
                        attempt,
                        MAX_ATTEMPTS
                    );
                    time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Utc;
    use common::models::{Direction, Signal};

    #[tokio::test]
    async fn second_claim_is_already_claimed() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_signal(&Signal {
                id: "s1".to_string(),
                symbol: "EURUSD".to_string(),
                direction: Direction::Buy,
                entry_price: 1.0850,
                stop_loss: 1.0820,
                take_profit: 1.0910,
                confidence: 0.65,
                reasoning: String::new(),
                timeframe: "15m".to_string(),
                created_at: Utc::now(),
                delivered: false,
            })
            .await
            .unwrap();

        let tracker = DeliveryTracker::new(store);
        let target = ClaimTarget::Signal {
            id: "s1".to_string(),
        };

        assert_eq!(tracker.try_claim(&target).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            tracker.try_claim(&target).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
    }
}
