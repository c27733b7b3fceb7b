use async_trait::async_trait;
use sqlx::SqlitePool;

use common::models::{ScreenshotRef, Signal, Trade, TradeEvent};

use crate::repositories::{ScreenshotsRepository, SignalsRepository, TradesRepository};
use crate::store::{ClaimOutcome, ClaimTarget, DocumentStore, StoreError};

/// SQLite-backed document store.
///
/// The pool is cheap to clone; the whole process shares one `SqliteStore`
/// constructed in `main` and injected into every component.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        SignalsRepository::insert(&self.pool, signal).await
    }

    async fn signal(&self, id: &str) -> Result<Signal, StoreError> {
        SignalsRepository::fetch(&self.pool, id).await
    }

    async fn latest_signals(&self, limit: u32) -> Result<Vec<Signal>, StoreError> {
        SignalsRepository::latest(&self.pool, limit).await
    }

    async fn pending_signals(&self) -> Result<Vec<Signal>, StoreError> {
        SignalsRepository::pending(&self.pool).await
    }

    async fn upsert_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        TradesRepository::upsert_with_event(&self.pool, trade).await
    }

    async fn active_trades(&self) -> Result<Vec<Trade>, StoreError> {
        TradesRepository::active(&self.pool).await
    }

    async fn pending_trade_events(&self) -> Result<Vec<TradeEvent>, StoreError> {
        TradesRepository::pending_events(&self.pool).await
    }

    async fn try_claim(&self, target: &ClaimTarget) -> Result<ClaimOutcome, StoreError> {
        match target {
            ClaimTarget::Signal { id } => SignalsRepository::try_claim(&self.pool, id).await,
            ClaimTarget::TradeEvent { id } => {
                TradesRepository::try_claim_event(&self.pool, id).await
            }
        }
    }

    async fn insert_screenshot(&self, screenshot: &ScreenshotRef) -> Result<(), StoreError> {
        ScreenshotsRepository::insert(&self.pool, screenshot).await
    }

    async fn latest_screenshots(&self, limit: u32) -> Result<Vec<ScreenshotRef>, StoreError> {
        ScreenshotsRepository::latest(&self.pool, limit).await
    }
}
