use std::sync::Mutex;

use async_trait::async_trait;

use common::models::{ScreenshotRef, Signal, Trade, TradeEvent};

use crate::store::{ClaimOutcome, ClaimTarget, DocumentStore, StoreError};

#[derive(Default)]
struct Inner {
    signals: Vec<Signal>,
    trades: Vec<Trade>,
    trade_events: Vec<TradeEvent>,
    screenshots: Vec<ScreenshotRef>,
}

/// In-memory document store with the same semantics as `SqliteStore`.
///
/// Used by the test suites and handy for running the relay without a
/// database file; the mutex gives claims the same atomicity the SQLite
/// CAS update provides.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.signals.iter().any(|s| s.id == signal.id) {
            return Err(StoreError::AlreadyExists {
                collection: "signals",
                id: signal.id.clone(),
            });
        }
        inner.signals.push(signal.clone());
        Ok(())
    }

    async fn signal(&self, id: &str) -> Result<Signal, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .signals
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: "signals",
                id: id.to_string(),
            })
    }

    async fn latest_signals(&self, limit: u32) -> Result<Vec<Signal>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut signals = inner.signals.clone();
        signals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        signals.truncate(limit as usize);
        Ok(signals)
    }

    async fn pending_signals(&self) -> Result<Vec<Signal>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut signals: Vec<Signal> = inner
            .signals
            .iter()
            .filter(|s| !s.delivered)
            .cloned()
            .collect();
        signals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(signals)
    }

    async fn upsert_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.trades.iter_mut().find(|t| t.id == trade.id) {
            Some(existing) => *existing = trade.clone(),
            None => inner.trades.push(trade.clone()),
        }
        let event = TradeEvent::for_transition(trade);
        inner.trade_events.push(event);
        Ok(())
    }

    async fn active_trades(&self) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .trades
            .iter()
            .filter(|t| t.status == common::models::TradeStatus::Active)
            .cloned()
            .collect())
    }

    async fn pending_trade_events(&self) -> Result<Vec<TradeEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<TradeEvent> = inner
            .trade_events
            .iter()
            .filter(|e| !e.app_notified)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(events)
    }

    async fn try_claim(&self, target: &ClaimTarget) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let flag = match target {
            ClaimTarget::Signal { id } => inner
                .signals
                .iter_mut()
                .find(|s| s.id == *id)
                .map(|s| &mut s.delivered),
            ClaimTarget::TradeEvent { id } => inner
                .trade_events
                .iter_mut()
                .find(|e| e.id == *id)
                .map(|e| &mut e.app_notified),
        };

        match flag {
            Some(flag) if !*flag => {
                *flag = true;
                Ok(ClaimOutcome::Claimed)
            }
            Some(_) => Ok(ClaimOutcome::AlreadyClaimed),
            None => Err(StoreError::NotFound {
                collection: target.collection(),
                id: target.id().to_string(),
            }),
        }
    }

    async fn insert_screenshot(&self, screenshot: &ScreenshotRef) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .screenshots
            .iter()
            .any(|s| s.filename == screenshot.filename)
        {
            return Err(StoreError::AlreadyExists {
                collection: "screenshots",
                id: screenshot.filename.clone(),
            });
        }
        inner.screenshots.push(screenshot.clone());
        Ok(())
    }

    async fn latest_screenshots(&self, limit: u32) -> Result<Vec<ScreenshotRef>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut shots = inner.screenshots.clone();
        shots.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        shots.truncate(limit as usize);
        Ok(shots)
    }
}
